pub mod common_io;
pub mod digit_csv;
pub mod holdout;
pub mod tensor_io;

pub type Mat = nalgebra::DMatrix<f32>;
