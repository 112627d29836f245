
/// The transaction manager was unable to allocate new transaction IDs
#[derive(Debug)]
pub enum TransactionManagerError {
    /// The transaction manager failed to allocate a new transaction ID
    AllocateTxnIdFailed,
}

/// Error allocating a new transaction ID on a session that doesn't act as a resource
#[derive(Debug)]
pub enum AllocTxnIdError {
    /// Resource-side transactions are not implemented by this session
    NotImplemented,
}

