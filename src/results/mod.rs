//! Domain types for suggestions, resolved results, and errors

mod types;

pub use types::{
    Address, BatchOutcome, Point, ResponseEnvelope, SearchError, SearchResult,
    SuggestAction, Suggestion,
};
