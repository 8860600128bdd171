pub mod candle;
pub mod decision;

pub use candle::*;
pub use decision::*;
