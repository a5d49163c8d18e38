//! Proposal domain entities.

mod fragment;
mod header;
mod proposal;
mod transaction;
mod transaction_list;

pub use fragment::{FragmentAssembler, ProposalFragment};
pub use header::{ProposalHeader, PROPOSAL_MESSAGE_TYPE};
pub use proposal::BlockProposal;
pub use transaction::Transaction;
pub use transaction_list::TransactionList;
