//! Message layer used by the compositors.
//!
//! A `Comm` is one rank's handle on the group of cooperating processes. All
//! operations block until the local side of the transfer completes; a failure
//! anywhere is fatal to the collective call. Messages between one ordered
//! (source, destination) pair are delivered in the order they were sent.

use crate::error::CompositeError;

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self) -> Result<(), CompositeError>;
    /// Send a byte message to `dest`.
    fn send(&self, dest: usize, bytes: &[u8]) -> Result<(), CompositeError>;
    /// Receive the next message sent by `src`.
    fn recv(&self, src: usize) -> Result<Vec<u8>, CompositeError>;

    /// Send to `dest` and receive from `src` in one step, without deadlocking
    /// when both sides of a pair exchange at once.
    fn exchange(&self, dest: usize, bytes: &[u8], src: usize) -> Result<Vec<u8>, CompositeError> {
        self.send(dest, bytes)?;
        self.recv(src)
    }

    /// Every rank's message, indexed by rank.
    fn all_gather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, CompositeError> {
        let (rank, size) = (self.rank(), self.size());
        let mut out = vec![Vec::new(); size];
        for shift in 1..size {
            let dest = (rank + shift) % size;
            let src = (rank + size - shift) % size;
            out[src] = self.exchange(dest, bytes, src)?;
        }
        out[rank] = bytes.to_vec();
        Ok(out)
    }

    /// Every rank's message on `root` (indexed by rank); `None` elsewhere.
    fn gather(&self, bytes: &[u8], root: usize) -> Result<Option<Vec<Vec<u8>>>, CompositeError> {
        let (rank, size) = (self.rank(), self.size());
        if rank != root {
            self.send(root, bytes)?;
            return Ok(None);
        }
        let mut out = Vec::with_capacity(size);
        for src in 0..size {
            if src == rank {
                out.push(bytes.to_vec());
            } else {
                out.push(self.recv(src)?);
            }
        }
        Ok(Some(out))
    }
}

impl<C: Comm + ?Sized> Comm for &C {
    fn rank(&self) -> usize { (**self).rank() }
    fn size(&self) -> usize { (**self).size() }
    fn barrier(&self) -> Result<(), CompositeError> { (**self).barrier() }
    fn send(&self, dest: usize, bytes: &[u8]) -> Result<(), CompositeError> { (**self).send(dest, bytes) }
    fn recv(&self, src: usize) -> Result<Vec<u8>, CompositeError> { (**self).recv(src) }
    fn exchange(&self, dest: usize, bytes: &[u8], src: usize) -> Result<Vec<u8>, CompositeError> {
        (**self).exchange(dest, bytes, src)
    }
    fn all_gather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, CompositeError> { (**self).all_gather(bytes) }
    fn gather(&self, bytes: &[u8], root: usize) -> Result<Option<Vec<Vec<u8>>>, CompositeError> {
        (**self).gather(bytes, root)
    }
}

pub mod local_comm;
pub use local_comm::{LocalComm, run_local};

#[cfg(feature="rayon")]
pub mod merge_pool;
#[cfg(feature="rayon")]
pub use merge_pool::init_merge_pool;

#[cfg(feature="mpi")]
pub mod mpi_comm;
#[cfg(feature="mpi")]
pub use mpi_comm::MpiComm;

/// Backend selected at runtime.
pub enum UniverseComm {
    #[cfg(feature="mpi")]
    Mpi(MpiComm),
    Local(LocalComm),
    Serial,
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
            UniverseComm::Local(comm) => comm.rank(),
            UniverseComm::Serial => 0,
        }
    }
    fn size(&self) -> usize {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
            UniverseComm::Local(comm) => comm.size(),
            UniverseComm::Serial => 1,
        }
    }
    fn barrier(&self) -> Result<(), CompositeError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
            UniverseComm::Local(comm) => comm.barrier(),
            UniverseComm::Serial => Ok(()),
        }
    }
    fn send(&self, dest: usize, bytes: &[u8]) -> Result<(), CompositeError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.send(dest, bytes),
            UniverseComm::Local(comm) => comm.send(dest, bytes),
            UniverseComm::Serial => Err(serial_peer(dest)),
        }
    }
    fn recv(&self, src: usize) -> Result<Vec<u8>, CompositeError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.recv(src),
            UniverseComm::Local(comm) => comm.recv(src),
            UniverseComm::Serial => Err(serial_peer(src)),
        }
    }
    fn exchange(&self, dest: usize, bytes: &[u8], src: usize) -> Result<Vec<u8>, CompositeError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.exchange(dest, bytes, src),
            UniverseComm::Local(comm) => comm.exchange(dest, bytes, src),
            UniverseComm::Serial => Err(serial_peer(dest)),
        }
    }
    fn all_gather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, CompositeError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.all_gather(bytes),
            UniverseComm::Local(comm) => comm.all_gather(bytes),
            UniverseComm::Serial => Ok(vec![bytes.to_vec()]),
        }
    }
    fn gather(&self, bytes: &[u8], root: usize) -> Result<Option<Vec<Vec<u8>>>, CompositeError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.gather(bytes, root),
            UniverseComm::Local(comm) => comm.gather(bytes, root),
            UniverseComm::Serial if root == 0 => Ok(Some(vec![bytes.to_vec()])),
            UniverseComm::Serial => Err(serial_peer(root)),
        }
    }
}

fn serial_peer(rank: usize) -> CompositeError {
    CompositeError::MessagingFailure(format!("serial communicator has no rank {rank}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_collectives_are_identity() {
        let comm = UniverseComm::Serial;
        assert_eq!(comm.all_gather(b"abc").unwrap(), vec![b"abc".to_vec()]);
        assert_eq!(comm.gather(b"x", 0).unwrap(), Some(vec![b"x".to_vec()]));
        assert!(comm.send(1, b"x").is_err());
    }
}
