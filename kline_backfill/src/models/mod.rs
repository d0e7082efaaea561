pub mod cursor;
pub mod document;
pub mod interval;
pub mod kline;
pub mod window;
