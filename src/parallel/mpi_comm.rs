//! MPI-based message layer.
//!
//! This module implements the `Comm` trait on top of an MPI world
//! communicator. It is only available when the `mpi` feature is enabled.
//!
//! Point-to-point messages are sent as raw byte vectors with the default tag;
//! MPI's non-overtaking rule provides the per-pair FIFO order the compositors
//! rely on. `exchange` posts the send as an immediate request before
//! receiving, so symmetric pairwise exchanges cannot deadlock on large
//! messages.
//!
//! # Example
//! ```no_run
//! #[cfg(feature = "mpi")]
//! {
//!     use sortlast::parallel::{Comm, MpiComm};
//!     let comm = MpiComm::new().unwrap();
//!     println!("Rank: {} / {}", comm.rank(), comm.size());
//! }
//! ```

use mpi::datatype::PartitionMut;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

use crate::error::CompositeError;

/// MPI communicator wrapper.
///
/// Keeps the `Universe` alive for as long as the communicator exists; MPI is
/// finalized when it drops.
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
    _universe: Universe,
}

impl MpiComm {
    /// Initializes MPI and wraps the world communicator.
    ///
    /// Fails if MPI was already initialized by someone else.
    pub fn new() -> Result<Self, CompositeError> {
        let universe = mpi::initialize()
            .ok_or_else(|| CompositeError::MessagingFailure("MPI already initialized".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { world, rank, size, _universe: universe })
    }

    fn count(len: usize) -> Result<Count, CompositeError> {
        Count::try_from(len)
            .map_err(|_| CompositeError::MessagingFailure(format!("message of {len} bytes exceeds MPI count range")))
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize { self.rank }
    fn size(&self) -> usize { self.size }

    fn barrier(&self) -> Result<(), CompositeError> {
        self.world.barrier();
        Ok(())
    }

    fn send(&self, dest: usize, bytes: &[u8]) -> Result<(), CompositeError> {
        self.world.process_at_rank(dest as i32).send(bytes);
        Ok(())
    }

    fn recv(&self, src: usize) -> Result<Vec<u8>, CompositeError> {
        let (msg, _status) = self.world.process_at_rank(src as i32).receive_vec::<u8>();
        Ok(msg)
    }

    fn exchange(&self, dest: usize, bytes: &[u8], src: usize) -> Result<Vec<u8>, CompositeError> {
        let msg = mpi::request::scope(|scope| {
            let req = self.world.process_at_rank(dest as i32).immediate_send(scope, bytes);
            let (msg, _status) = self.world.process_at_rank(src as i32).receive_vec::<u8>();
            req.wait();
            msg
        });
        Ok(msg)
    }

    /// Variable-length all-gather: lengths first, then one `allgatherv`.
    fn all_gather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, CompositeError> {
        let len = Self::count(bytes.len())?;
        let mut counts = vec![0 as Count; self.size];
        self.world.all_gather_into(&len, &mut counts[..]);

        let mut displs = Vec::with_capacity(self.size);
        let mut total: Count = 0;
        for &c in &counts {
            displs.push(total);
            total = total
                .checked_add(c)
                .ok_or_else(|| CompositeError::MessagingFailure("all-gather payload exceeds MPI count range".into()))?;
        }
        let mut buf = vec![0u8; total as usize];
        {
            let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(bytes, &mut partition);
        }
        Ok(counts
            .iter()
            .zip(&displs)
            .map(|(&c, &d)| buf[d as usize..(d + c) as usize].to_vec())
            .collect())
    }
}
