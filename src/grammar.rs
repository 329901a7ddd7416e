//! The per-role handshake grammar, consumed by the sub-state machines.
//!
//! The driver knows nothing about which messages make up a handshake. It
//! asks a [`HandshakeGrammar`] (one implementation per role, both handed
//! over at construction) whether an inbound message is legal, how large
//! it may be, how to process it, and what to construct and send next. The
//! grammar in turn advances [`Conn::hand_state`] as messages flow.
//!
//! [`Conn::hand_state`]: crate::Conn::hand_state

use crate::conn::Conn;
use crate::error::Error;
use crate::types::MessageType;

/// Progress token for resumable work.
///
/// Work callbacks receive the token from the previous attempt and return
/// the next one. The driver never interprets the `More*` values; it only
/// distinguishes terminal tokens from unfinished ones. An unfinished token
/// is stored and the driver suspends, so arbitrarily long work can be
/// spread across non-blocking I/O stalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Work {
    /// First (or only) phase of the work is still in progress.
    MoreA,
    /// Second phase is still in progress.
    MoreB,
    /// Third phase is still in progress.
    MoreC,
    /// Work is done; continue with the current flow.
    FinishedContinue,
    /// Work is done and so is the whole handshake.
    FinishedStop,
}

impl Work {
    /// True for the unfinished `More*` tokens.
    pub fn is_unfinished(&self) -> bool {
        matches!(self, Work::MoreA | Work::MoreB | Work::MoreC)
    }
}

/// What to do after a message body has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The inbound flight is complete; flip to writing.
    FinishedReading,
    /// Post-processing is required (it may block); run the work loop.
    ContinueProcessing,
    /// More messages are expected; read the next header.
    ContinueReading,
}

/// Outcome of a write-side transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTransition {
    /// A message should be constructed and sent from the new state.
    Continue,
    /// Nothing (more) to write; flip to reading.
    Finished,
}

/// The callbacks encoding one role's handshake grammar.
///
/// All eight callbacks must be functional; the driver dereferences them
/// freely. Callbacks returning `Result` treat `Err` as fatal for the
/// connection. Work callbacks signal suspension by returning an unfinished
/// [`Work`] token, not an error.
pub trait HandshakeGrammar: Send {
    /// Decide whether `msg_type` is acceptable in the current protocol
    /// state, and if so advance [`Conn::hand_state`] to the state that
    /// message represents. Returning `false` makes the driver reject the
    /// peer with a fatal `unexpected_message` alert.
    ///
    /// [`Conn::hand_state`]: crate::Conn::hand_state
    fn read_transition(&mut self, conn: &mut Conn, msg_type: MessageType) -> bool;

    /// Largest message body acceptable in the current protocol state.
    fn max_message_size(&self, conn: &Conn) -> usize;

    /// Process a complete message body of `len` bytes.
    fn process_message(&mut self, conn: &mut Conn, len: usize) -> Result<ProcessOutcome, Error>;

    /// Continue (possibly blocking) post-processing of the last message.
    fn post_process_message(&mut self, conn: &mut Conn, work: Work) -> Result<Work, Error>;

    /// Advance [`Conn::hand_state`] to the next message this role should
    /// write, or report that the outbound flight is complete.
    ///
    /// [`Conn::hand_state`]: crate::Conn::hand_state
    fn write_transition(&mut self, conn: &mut Conn) -> Result<WriteTransition, Error>;

    /// Work to perform before constructing the next message.
    fn pre_work(&mut self, conn: &mut Conn, work: Work) -> Result<Work, Error>;

    /// Build the pending message into the connection scratch buffer.
    fn construct_message(&mut self, conn: &mut Conn) -> Result<(), Error>;

    /// Work to perform after the message has been written out.
    fn post_work(&mut self, conn: &mut Conn, work: Work) -> Result<Work, Error>;
}
