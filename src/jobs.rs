use libc::pid_t;

use crate::error::JobError;

/// Maximum number of live jobs.
pub const MAX_JOBS: usize = 16;
/// Maximum number of processes (pipeline stages) in one job.
pub const MAX_MEMBERS: usize = 16;
/// Bytes of command line retained per job.
pub const MAX_CMDLINE: usize = 1024;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Foreground,
    Background,
    Stopped,
}

impl JobState {
    pub fn label(self) -> &'static str {
        match self {
            JobState::Foreground => "Foreground",
            JobState::Background => "Running",
            JobState::Stopped => "Stopped",
        }
    }
}

/// Owned copy of a job, taken for display and lookups from the main flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub seq: usize,
    pub pgid: pid_t,
    pub members: Vec<pid_t>,
    pub state: JobState,
    pub command: String,
}

/// What [`JobTable::remove_member`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub seq: usize,
    pub pgid: pid_t,
    pub state: JobState,
    /// The removed process was the job's last member; the slot is now free.
    pub job_finished: bool,
}

/// One arena slot. Everything is inline so the slot can be filled and cleared
/// from a signal handler without touching the allocator.
#[derive(Clone, Copy)]
struct Slot {
    /// 0 marks a free slot.
    pgid: pid_t,
    seq: usize,
    state: JobState,
    members: [pid_t; MAX_MEMBERS],
    member_count: usize,
    cmdline: [u8; MAX_CMDLINE],
    cmdline_len: usize,
}

impl Slot {
    const EMPTY: Slot = Slot {
        pgid: 0,
        seq: 0,
        state: JobState::Background,
        members: [0; MAX_MEMBERS],
        member_count: 0,
        cmdline: [0; MAX_CMDLINE],
        cmdline_len: 0,
    };

    fn is_free(&self) -> bool {
        self.pgid == 0
    }

    fn members(&self) -> &[pid_t] {
        &self.members[..self.member_count]
    }

    fn command(&self) -> &str {
        // Stored bytes are always cut at a char boundary.
        std::str::from_utf8(&self.cmdline[..self.cmdline_len]).unwrap_or_default()
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            seq: self.seq,
            pgid: self.pgid,
            members: self.members().to_vec(),
            state: self.state,
            command: self.command().to_string(),
        }
    }
}

/// Fixed-capacity registry of live jobs, indexed by slot.
///
/// Nothing in here allocates except the snapshot constructors, which only the
/// main flow calls. See `signals` for how access is serialized.
pub struct JobTable {
    slots: [Slot; MAX_JOBS],
    next_seq: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; MAX_JOBS],
            next_seq: 1,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.slots.iter().any(Slot::is_free)
    }

    /// Record a new job. Returns its sequence number.
    pub fn register(
        &mut self,
        pgid: pid_t,
        members: &[pid_t],
        state: JobState,
        cmdline: &str,
    ) -> Result<usize, JobError> {
        if members.is_empty() || pgid <= 0 {
            return Err(JobError::NoMembers);
        }
        if members.len() > MAX_MEMBERS {
            return Err(JobError::TooManyMembers {
                count: members.len(),
                max: MAX_MEMBERS,
            });
        }
        if let Some(&pid) = members.iter().find(|&&pid| self.group_of(pid).is_some()) {
            return Err(JobError::DuplicatePid(pid));
        }
        if state == JobState::Foreground {
            if let Some(existing) = self.foreground_group() {
                return Err(JobError::ForegroundConflict { existing });
            }
        }
        let seq = self.next_seq;
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_free())
            .ok_or(JobError::TableFull)?;

        let text = truncate_at_boundary(cmdline, MAX_CMDLINE);
        *slot = Slot::EMPTY;
        slot.pgid = pgid;
        slot.seq = seq;
        slot.state = state;
        slot.members[..members.len()].copy_from_slice(members);
        slot.member_count = members.len();
        slot.cmdline[..text.len()].copy_from_slice(text.as_bytes());
        slot.cmdline_len = text.len();

        self.next_seq += 1;
        Ok(seq)
    }

    /// Drop one process from its job, freeing the slot if it was the last.
    pub fn remove_member(&mut self, pid: pid_t) -> Option<Removal> {
        let slot = self.slot_of_pid_mut(pid)?;
        let members = slot.member_count;
        if let Some(index) = slot.members[..members].iter().position(|&p| p == pid) {
            slot.members.copy_within(index + 1..members, index);
            slot.member_count -= 1;
            slot.members[slot.member_count] = 0;
        }

        let removal = Removal {
            seq: slot.seq,
            pgid: slot.pgid,
            state: slot.state,
            job_finished: slot.member_count == 0,
        };
        if removal.job_finished {
            // Header fields alone mark the slot free; buffers are rewritten on reuse.
            slot.pgid = 0;
            slot.seq = 0;
            slot.cmdline_len = 0;
            self.next_seq = self.max_seq() + 1;
        }
        Some(removal)
    }

    pub fn find_by_pid(&self, pid: pid_t) -> Option<JobSnapshot> {
        self.slot_of_pid(pid).map(Slot::snapshot)
    }

    pub fn find_by_sequence(&self, seq: usize) -> Option<JobSnapshot> {
        if seq == 0 {
            return None;
        }
        self.slots
            .iter()
            .find(|s| !s.is_free() && s.seq == seq)
            .map(Slot::snapshot)
    }

    /// Process group owning `pid`.
    pub fn group_of(&self, pid: pid_t) -> Option<pid_t> {
        self.slot_of_pid(pid).map(|s| s.pgid)
    }

    /// Sequence number of the job owning `pid`.
    pub fn sequence_of(&self, pid: pid_t) -> Option<usize> {
        self.slot_of_pid(pid).map(|s| s.seq)
    }

    pub fn state_of(&self, pgid: pid_t) -> Option<JobState> {
        self.slot_of_group(pgid).map(|s| s.state)
    }

    /// Change a job's state. Moving a job to the foreground while another
    /// job holds it is rejected rather than silently demoting the holder.
    pub fn set_state(&mut self, pgid: pid_t, state: JobState) -> Result<(), JobError> {
        if state == JobState::Foreground {
            if let Some(existing) = self.foreground_group().filter(|&g| g != pgid) {
                return Err(JobError::ForegroundConflict { existing });
            }
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| !s.is_free() && s.pgid == pgid)
            .ok_or(JobError::NoSuchJob(pgid))?;
        slot.state = state;
        Ok(())
    }

    pub fn foreground_group(&self) -> Option<pid_t> {
        self.slots
            .iter()
            .find(|s| !s.is_free() && s.state == JobState::Foreground)
            .map(|s| s.pgid)
    }

    pub fn is_foreground(&self, pgid: pid_t) -> bool {
        self.state_of(pgid) == Some(JobState::Foreground)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    /// All jobs sorted by sequence number (ascending).
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .slots
            .iter()
            .filter(|s| !s.is_free())
            .map(Slot::snapshot)
            .collect();
        jobs.sort_by_key(|j| j.seq);
        jobs
    }

    fn max_seq(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.is_free())
            .map(|s| s.seq)
            .max()
            .unwrap_or(0)
    }

    fn slot_of_pid(&self, pid: pid_t) -> Option<&Slot> {
        if pid <= 0 {
            return None;
        }
        self.slots
            .iter()
            .find(|s| !s.is_free() && s.members().contains(&pid))
    }

    fn slot_of_pid_mut(&mut self, pid: pid_t) -> Option<&mut Slot> {
        if pid <= 0 {
            return None;
        }
        self.slots
            .iter_mut()
            .find(|s| !s.is_free() && s.members().contains(&pid))
    }

    fn slot_of_group(&self, pgid: pid_t) -> Option<&Slot> {
        if pgid <= 0 {
            return None;
        }
        self.slots.iter().find(|s| !s.is_free() && s.pgid == pgid)
    }
}

fn truncate_at_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
