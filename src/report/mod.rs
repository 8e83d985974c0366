//! Plain-terminal summaries printed after a run and by `history`.

pub mod history;
pub mod results;
