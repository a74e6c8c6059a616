//! Opaque handles into the backend's process-wide handle table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle_type!(
    /// An open pool ledger connection.
    PoolHandle
);
handle_type!(
    /// An open wallet.
    WalletHandle
);
handle_type!(
    /// A credential search started for a proof request.
    SearchHandle
);
handle_type!(
    /// A configured tails writer.
    BlobWriterHandle
);
handle_type!(
    /// A configured tails reader.
    BlobReaderHandle
);

/// Monotonic allocator shared by every handle kind.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicI32,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicI32::new(1),
        }
    }

    pub fn next(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
