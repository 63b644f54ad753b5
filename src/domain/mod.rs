//! The DailyCard tool catalog and its widget resource
//!
//! Provides the tarot deck, the `dailycard.draw` tool, and the template resource
//! the tool output is rendered with.

pub mod resources;
pub mod tarot;
pub mod tools;
