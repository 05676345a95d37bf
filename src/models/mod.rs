pub mod price_lstm;
