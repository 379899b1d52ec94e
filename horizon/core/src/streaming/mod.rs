//! Response Streaming
//!
//! The assistant service answers in one of two shapes, with nothing on the
//! wire to tell them apart:
//!
//! ```text
//!   {"content": "...", "is_complete": true}     structured frame
//!   Hello, wor                                  raw fragment
//!   ld!                                         raw fragment
//! ```
//!
//! Every inbound text payload is first decoded as a structured frame; when
//! that fails it is treated as a raw fragment. [`InboundFrame`] makes the
//! outcome an explicit variant and [`ResponseAssembler`] folds the frames of a
//! turn into the current response text.
//!
//! # Example
//!
//! ```
//! use horizon_core::streaming::{InboundFrame, ResponseAssembler};
//!
//! let mut assembler = ResponseAssembler::new();
//! assembler.begin_turn();
//!
//! assembler.ingest(InboundFrame::classify("Hello"));
//! assembler.ingest(InboundFrame::classify(" there ,"));
//! assert_eq!(assembler.current(), "Hello there,");
//! ```

mod assembler;

pub use assembler::{
    normalize_trailing_punctuation, AssistantReply, InboundFrame, PendingResponse,
    ResponseAssembler,
};
