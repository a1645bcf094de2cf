//! # Domain Models
//!
//! Typed payloads served by the market wrappers.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FundQuote`] | Latest (estimated) fund price |
//! | [`FundHistory`] | Net asset value history |
//! | [`SectorFlow`] | Capital flow for one sector board |
//! | [`NewsItem`] | One finance news headline |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! The orchestrator itself treats payloads as opaque JSON; these types are
//! only decoded after a payload has been served.

mod models;
mod timestamp;

pub use models::{
    FlowIndicator, FundHistory, FundQuote, NavPoint, NewsItem, SectorFlow, SectorType,
};
pub use timestamp::UtcDateTime;
