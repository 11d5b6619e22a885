/// 股票報價
pub mod stock_data;
