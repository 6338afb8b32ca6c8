pub mod terminator;
