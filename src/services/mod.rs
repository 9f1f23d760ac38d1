pub mod binance;
pub mod scan_state;
pub mod scanner;
