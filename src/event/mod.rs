/// 抓取並儲存股票報價
pub mod stock_quote;
