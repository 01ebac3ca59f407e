//! Domain types for the trading engine

pub mod bar;
pub mod instrument;
pub mod market;
pub mod position;
pub mod signal;

pub use bar::Bar;
pub use instrument::{InstrumentError, SymbolSpec};
pub use market::{AccountInfo, MarketState, Quote, Timeframe};
pub use position::{Position, Ticket};
pub use signal::{Direction, SignalType, TradeSignal};
