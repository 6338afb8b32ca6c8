pub mod channels;
pub mod compositor;
pub mod hemisphere;
pub mod seam;
