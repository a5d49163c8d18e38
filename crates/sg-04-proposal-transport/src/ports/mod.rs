//! Ports of the transport.

mod outbound;

pub use outbound::{
    PendingQueueSource, ProposerSchedule, RoundRobinSchedule, TestTransactionGenerator,
    TransactionSource,
};
