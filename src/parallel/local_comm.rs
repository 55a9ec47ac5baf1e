// In-process message passing: every rank is a thread, every ordered pair of
// ranks gets its own unbounded FIFO channel.

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::Comm;
use crate::error::CompositeError;

pub struct LocalComm {
    rank: usize,
    size: usize,
    /// `to[d]` delivers to rank `d`.
    to: Vec<Sender<Vec<u8>>>,
    /// `from[s]` yields messages sent by rank `s`.
    from: Vec<Receiver<Vec<u8>>>,
}

impl LocalComm {
    /// Build the communicators for a group of `size` ranks, index = rank.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        let mut to: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut from: Vec<Vec<Receiver<Vec<u8>>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = unbounded();
                to[src].push(tx);
                // Receivers are pushed in `src` order for every `dst`.
                from[dst].push(rx);
            }
        }
        to.into_iter()
            .zip(from)
            .enumerate()
            .map(|(rank, (to, from))| LocalComm { rank, size, to, from })
            .collect()
    }

    fn check_peer(&self, peer: usize) -> Result<(), CompositeError> {
        if peer >= self.size {
            return Err(CompositeError::MessagingFailure(format!(
                "rank {peer} outside communicator of size {}",
                self.size
            )));
        }
        Ok(())
    }
}

impl Comm for LocalComm {
    fn rank(&self) -> usize { self.rank }
    fn size(&self) -> usize { self.size }

    fn barrier(&self) -> Result<(), CompositeError> {
        self.all_gather(&[]).map(|_| ())
    }

    fn send(&self, dest: usize, bytes: &[u8]) -> Result<(), CompositeError> {
        self.check_peer(dest)?;
        self.to[dest].send(bytes.to_vec()).map_err(|_| {
            CompositeError::MessagingFailure(format!("rank {dest} hung up before rank {} could send", self.rank))
        })
    }

    fn recv(&self, src: usize) -> Result<Vec<u8>, CompositeError> {
        self.check_peer(src)?;
        self.from[src].recv().map_err(|_| {
            CompositeError::MessagingFailure(format!("rank {src} hung up before sending to rank {}", self.rank))
        })
    }
}

/// Run `f` on `size` threads, one per rank, and collect the results by rank.
/// A panic on any rank is resumed on the caller.
pub fn run_local<R, F>(size: usize, f: F) -> Vec<R>
where
    F: Fn(LocalComm) -> R + Sync,
    R: Send,
{
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::universe(size)
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
