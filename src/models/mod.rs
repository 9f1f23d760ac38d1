pub mod candle;
pub mod interval;
pub mod signal;
