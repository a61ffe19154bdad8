//! Message passing between the processes of a distributed computation.
//!
//! The distributed bases only need a handful of collectives: a variable
//! all-to-all exchange, an all-gather and reductions over fixed-size values.
//! [`Communicator`] names exactly these. [`ThreadCommunicator`] realizes them
//! for a group of threads of one process, connected pairwise by channels.

use std::any::Any;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{EdError, ErrorKind, Result};

/// The collectives a distributed basis relies on.
///
/// Every process of a group must call the same collectives in the same order.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Sends `send[offset_d..offset_d + send_counts[d]]` to every process `d`.
    ///
    /// # Returns
    ///
    /// The concatenation of the data received from all processes, ordered by
    /// source rank, and the number of elements received from each source.
    fn all_to_all_v<T: Copy + Send + 'static>(
        &self,
        send: &[T],
        send_counts: &[usize],
    ) -> Result<(Vec<T>, Vec<usize>)>;

    /// The values of all processes, ordered by rank.
    fn all_gather<T: Copy + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        let send = vec![value; self.size()];
        let counts = vec![1; self.size()];
        Ok(self.all_to_all_v(&send, &counts)?.0)
    }

    fn sum(&self, value: u64) -> Result<u64> {
        Ok(self.all_gather(value)?.into_iter().sum())
    }

    fn min(&self, value: u64) -> Result<u64> {
        Ok(self.all_gather(value)?.into_iter().min().unwrap_or(value))
    }

    fn max(&self, value: u64) -> Result<u64> {
        Ok(self.all_gather(value)?.into_iter().max().unwrap_or(value))
    }

    /// Sum of a floating-point value over all processes.
    fn sum_f64(&self, value: f64) -> Result<f64> {
        Ok(self.all_gather(value)?.into_iter().sum())
    }
}

type Message = Box<dyn Any + Send>;

/// One member of a group of threads exchanging data through channels.
///
/// Every ordered pair of members is connected by its own unbounded channel,
/// so sends never block and an exchange completes as soon as every member
/// has sent its share.
#[derive(Debug)]
pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    senders: Vec<Sender<Message>>,
    receivers: Vec<Receiver<Message>>,
}

impl ThreadCommunicator {
    /// Creates the `size` connected members of a group; member `r` has rank `r`.
    pub fn group(size: usize) -> Vec<ThreadCommunicator> {
        let mut senders: Vec<Vec<Sender<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Receiver<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        for source in 0..size {
            for destination in 0..size {
                let (tx, rx) = mpsc::channel();
                senders[source].push(tx);
                receivers[destination].push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadCommunicator {
                rank,
                size,
                senders,
                receivers,
            })
            .collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_to_all_v<T: Copy + Send + 'static>(
        &self,
        send: &[T],
        send_counts: &[usize],
    ) -> Result<(Vec<T>, Vec<usize>)> {
        if send_counts.len() != self.size {
            return Err(ErrorKind::InputError(format!(
                "{} send counts given for a group of {} processes",
                send_counts.len(),
                self.size
            ))
            .into());
        }
        let total: usize = send_counts.iter().sum();
        if total != send.len() {
            return Err(ErrorKind::InputError(format!(
                "send counts add up to {total} but the send buffer holds {} elements",
                send.len()
            ))
            .into());
        }

        let mut offset = 0;
        for (destination, &count) in send_counts.iter().enumerate() {
            let chunk: Vec<T> = send[offset..offset + count].to_vec();
            offset += count;
            self.senders[destination]
                .send(Box::new(chunk))
                .map_err(|_| {
                    EdError::from(ErrorKind::Communication(format!(
                        "rank {} cannot reach rank {destination}",
                        self.rank
                    )))
                })?;
        }

        let mut received = Vec::new();
        let mut counts = Vec::with_capacity(self.size);
        for (source, receiver) in self.receivers.iter().enumerate() {
            let message = receiver.recv().map_err(|_| {
                EdError::from(ErrorKind::Communication(format!(
                    "rank {source} left the group before sending to rank {}",
                    self.rank
                )))
            })?;
            let chunk = message.downcast::<Vec<T>>().map_err(|_| {
                EdError::from(ErrorKind::Communication(format!(
                    "unexpected payload type received from rank {source}"
                )))
            })?;
            counts.push(chunk.len());
            received.extend_from_slice(&chunk);
        }
        Ok((received, counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_to_all_routes_by_rank() {
        let comms = ThreadCommunicator::group(3);
        let results: Vec<(Vec<usize>, Vec<usize>)> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let r = comm.rank();
                        // rank r sends r+1 copies of 10*r + d to rank d
                        let mut send = Vec::new();
                        let mut counts = Vec::new();
                        for d in 0..comm.size() {
                            counts.push(r + 1);
                            send.extend(std::iter::repeat_n(10 * r + d, r + 1));
                        }
                        comm.all_to_all_v(&send, &counts).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let (data, counts) = &results[2];
        assert_eq!(counts, &vec![1, 2, 3]);
        assert_eq!(data, &vec![2, 12, 12, 22, 22, 22]);
    }

    #[test]
    fn test_reductions() {
        let comms = ThreadCommunicator::group(4);
        let results: Vec<(u64, u64, u64)> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let v = 3 + comm.rank() as u64;
                        (
                            comm.sum(v).unwrap(),
                            comm.min(v).unwrap(),
                            comm.max(v).unwrap(),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|&r| r == (18, 3, 6)));
    }

    #[test]
    fn test_invalid_counts() {
        let comms = ThreadCommunicator::group(1);
        let err = comms[0].all_to_all_v(&[1.0, 2.0], &[1]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input parameter: send counts add up to 1 but the send buffer holds 2 elements"
        );
    }
}
