//! Circular store of interleaved PCM frames.
//!
//! The ring is the sole shared mutable state of the pipeline and is touched
//! only by the loop that owns it, so it needs no locking. One slot is
//! sacrificed to disambiguate full from empty, giving the standing invariant
//! `available() + free() == capacity() - 1`.
//!
//! All access is wrap-aware bulk copying split into at most two contiguous
//! ranges - never per-sample modulo indexing - and strictly FIFO: the k-th
//! frame written is the k-th frame read.

use crate::MonitorError;

/// Fixed-capacity circular buffer of interleaved `i16` frames.
///
/// Capacity is fixed at creation. There is no implicit overwrite: callers
/// must bound requests by [`available()`](Self::available) and
/// [`free()`](Self::free) first, and a request exceeding them fails with
/// [`MonitorError::Capacity`].
pub struct RingBuffer {
    storage: Vec<i16>,
    capacity: usize,
    channels: usize,
    read_pos: usize,
    write_pos: usize,
}

impl RingBuffer {
    /// Creates a ring holding up to `capacity - 1` frames of `channels`
    /// interleaved samples each.
    #[must_use]
    pub fn new(capacity: usize, channels: usize) -> Self {
        assert!(capacity >= 2, "ring needs at least two slots");
        assert!(channels >= 1, "ring needs at least one channel");
        Self {
            storage: vec![0i16; capacity * channels],
            capacity,
            channels,
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Total slot count fixed at creation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Interleaved samples per frame.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Unread frames currently held.
    #[must_use]
    pub fn available(&self) -> usize {
        (self.write_pos + self.capacity - self.read_pos) % self.capacity
    }

    /// Frames that can be written without overtaking the reader.
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity - 1 - self.available()
    }

    /// Appends whole frames at the write cursor.
    ///
    /// `frames.len()` must be a multiple of the channel count. Fails with
    /// [`MonitorError::Capacity`] if more than [`free()`](Self::free) frames
    /// are offered.
    pub fn write(&mut self, frames: &[i16]) -> Result<(), MonitorError> {
        let count = self.frame_count(frames.len());
        if count > self.free() {
            return Err(MonitorError::Capacity {
                requested: count,
                available: self.free(),
            });
        }

        let first = count.min(self.capacity - self.write_pos);
        let start = self.write_pos * self.channels;
        self.storage[start..start + first * self.channels]
            .copy_from_slice(&frames[..first * self.channels]);
        if first < count {
            let rest = (count - first) * self.channels;
            self.storage[..rest].copy_from_slice(&frames[first * self.channels..]);
        }

        self.write_pos = (self.write_pos + count) % self.capacity;
        Ok(())
    }

    /// Consumes whole frames from the read cursor into `dst`.
    ///
    /// Fails with [`MonitorError::Capacity`] if more than
    /// [`available()`](Self::available) frames are requested.
    pub fn read(&mut self, dst: &mut [i16]) -> Result<(), MonitorError> {
        let count = self.frame_count(dst.len());
        if count > self.available() {
            return Err(MonitorError::Capacity {
                requested: count,
                available: self.available(),
            });
        }

        self.copy_out(self.read_pos, dst);
        self.read_pos = (self.read_pos + count) % self.capacity;
        Ok(())
    }

    /// Exposes the free region as at most two contiguous mutable slices,
    /// for a device to capture directly into. Commit with
    /// [`advance_write`](Self::advance_write).
    pub fn write_slices(&mut self) -> (&mut [i16], &mut [i16]) {
        let free = self.free();
        let ch = self.channels;
        if self.write_pos + free <= self.capacity {
            let start = self.write_pos * ch;
            let empty: &mut [i16] = &mut [];
            (&mut self.storage[start..start + free * ch], empty)
        } else {
            let wrap = (self.write_pos + free - self.capacity) * ch;
            let (head, tail) = self.storage.split_at_mut(self.write_pos * ch);
            (tail, &mut head[..wrap])
        }
    }

    /// Exposes the unread region as at most two contiguous slices, for a
    /// device to play directly from. Commit with
    /// [`advance_read`](Self::advance_read).
    pub fn read_slices(&self) -> (&[i16], &[i16]) {
        let avail = self.available();
        let ch = self.channels;
        if self.read_pos + avail <= self.capacity {
            let start = self.read_pos * ch;
            (&self.storage[start..start + avail * ch], &[])
        } else {
            let wrap = (self.read_pos + avail - self.capacity) * ch;
            (&self.storage[self.read_pos * ch..], &self.storage[..wrap])
        }
    }

    /// Commits `count` frames previously filled through
    /// [`write_slices`](Self::write_slices).
    pub fn advance_write(&mut self, count: usize) -> Result<(), MonitorError> {
        if count > self.free() {
            return Err(MonitorError::Capacity {
                requested: count,
                available: self.free(),
            });
        }
        self.write_pos = (self.write_pos + count) % self.capacity;
        Ok(())
    }

    /// Releases `count` frames previously consumed through
    /// [`read_slices`](Self::read_slices).
    pub fn advance_read(&mut self, count: usize) -> Result<(), MonitorError> {
        if count > self.available() {
            return Err(MonitorError::Capacity {
                requested: count,
                available: self.available(),
            });
        }
        self.read_pos = (self.read_pos + count) % self.capacity;
        Ok(())
    }

    /// Copies frames starting `offset` frames past the read cursor into
    /// `dst` without consuming them.
    pub fn peek(&self, offset: usize, dst: &mut [i16]) -> Result<(), MonitorError> {
        let count = self.frame_count(dst.len());
        if offset + count > self.available() {
            return Err(MonitorError::Capacity {
                requested: offset + count,
                available: self.available(),
            });
        }
        self.copy_out((self.read_pos + offset) % self.capacity, dst);
        Ok(())
    }

    /// Overwrites frames starting `offset` frames past the read cursor,
    /// leaving both cursors untouched.
    ///
    /// Used to scatter a processed block back over exactly the frames it
    /// was gathered from.
    pub fn overwrite(&mut self, offset: usize, src: &[i16]) -> Result<(), MonitorError> {
        let count = self.frame_count(src.len());
        if offset + count > self.available() {
            return Err(MonitorError::Capacity {
                requested: offset + count,
                available: self.available(),
            });
        }

        let pos = (self.read_pos + offset) % self.capacity;
        let first = count.min(self.capacity - pos);
        let start = pos * self.channels;
        self.storage[start..start + first * self.channels]
            .copy_from_slice(&src[..first * self.channels]);
        if first < count {
            let rest = (count - first) * self.channels;
            self.storage[..rest].copy_from_slice(&src[first * self.channels..]);
        }
        Ok(())
    }

    fn copy_out(&self, pos: usize, dst: &mut [i16]) {
        let count = dst.len() / self.channels;
        let first = count.min(self.capacity - pos);
        let start = pos * self.channels;
        dst[..first * self.channels]
            .copy_from_slice(&self.storage[start..start + first * self.channels]);
        if first < count {
            let rest = (count - first) * self.channels;
            dst[first * self.channels..].copy_from_slice(&self.storage[..rest]);
        }
    }

    fn frame_count(&self, samples: usize) -> usize {
        debug_assert_eq!(samples % self.channels, 0, "partial frame");
        samples / self.channels
    }
}
