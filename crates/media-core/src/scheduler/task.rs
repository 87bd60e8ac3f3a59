//! Task trait and queue identifiers for the media scheduler

use mediagw_rtp_core::ClockSample;

use crate::Result;

/// Number of scheduling queues
pub const QUEUE_COUNT: usize = 4;

/// The scheduling queues, in pipeline order.
///
/// Each tick runs every queue to completion before the next one, so
/// data written by an input task is visible to the mixer stages and
/// the output tasks within the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskQueue {
    /// Network-to-graph: drain jitter buffers, decode
    Input,
    /// Feed decoded frames into mixers
    MixerInput,
    /// Pull mixed frames out of mixers
    MixerOutput,
    /// Graph-to-network: encode, packetize, send
    Output,
}

impl TaskQueue {
    /// Queues in the order the scheduler runs them each tick
    pub const PRIORITY_ORDER: [TaskQueue; QUEUE_COUNT] = [
        TaskQueue::Input,
        TaskQueue::MixerInput,
        TaskQueue::MixerOutput,
        TaskQueue::Output,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            TaskQueue::Input => 0,
            TaskQueue::MixerInput => 1,
            TaskQueue::MixerOutput => 2,
            TaskQueue::Output => 3,
        }
    }
}

/// A unit of periodic media work.
///
/// `process` is called once per tick with the current media clock
/// sample and must not block: network and disk I/O belong in the async
/// layers around the scheduler, not inside a tick. Returning an error
/// removes the task from the scheduler.
pub trait MediaTask: Send {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Run one tick of work
    fn process(&mut self, now: ClockSample) -> Result<()>;
}

/// Identifies a registered task for later unregistration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    pub(crate) queue: TaskQueue,
    pub(crate) id: u64,
}

impl TaskHandle {
    /// The queue the task was registered in
    pub fn queue(&self) -> TaskQueue {
        self.queue
    }
}
