//! Пул байтовых буферов с размерными классами.
//!
//! Классы растут степенями двойки от `min_size` и заканчиваются ровно на
//! `max_size`. Запрос обслуживает наименьший класс, вмещающий его; всё, что
//! больше `max_size`, выделяется мимо пула и при возврате отбрасывается.
//! Каждый класс хранит не больше `slots` свободных буферов, лишние отбрасываются.

use super::{
    errors::ConfigError,
    model::BufferMetrics,
    result::ConfigResult,
};
use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};
use crossbeam::queue::ArrayQueue;


pub const DEFAULT_CLASS_SLOTS: usize = 256;


struct SizeClass {
    capacity: usize,
    free: ArrayQueue<Vec<u8>>,
}

impl SizeClass {
    fn new(capacity: usize, slots: usize) -> Self {
        Self {
            capacity,
            free: ArrayQueue::new(slots),
        }
    }
}


pub struct SizeClassPool {
    min_size: usize,
    max_size: usize,
    classes: Vec<SizeClass>,
    allocations: AtomicUsize,
    reused: AtomicUsize,
    discarded: AtomicUsize,
}

impl SizeClassPool {
    pub fn new(min_size: usize, max_size: usize) -> ConfigResult<Self> {
        Self::with_slots(min_size, max_size, DEFAULT_CLASS_SLOTS)
    }

    /// Пул, где каждый класс держит не больше `slots` свободных буферов
    pub fn with_slots(min_size: usize, max_size: usize, slots: usize) -> ConfigResult<Self> {
        if max_size < min_size {
            return Err(ConfigError::InvalidRange { min: min_size, max: max_size });
        }
        if min_size == 0 {
            return Err(ConfigError::ZeroMinSize);
        }

        let slots = slots.max(1);
        let mut classes = Vec::new();
        let mut size = min_size;
        while size < max_size {
            classes.push(SizeClass::new(size, slots));
            size = match size.checked_mul(2) {
                Some(next) => next,
                None => break,
            };
        }
        classes.push(SizeClass::new(max_size, slots));

        Ok(Self {
            min_size,
            max_size,
            classes,
            allocations: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn class_capacities(&self) -> Vec<usize> {
        self.classes.iter().map(|c| c.capacity).collect()
    }

    /// Индекс наименьшего класса с ёмкостью >= `size`:
    /// `ceil(log2(size / min_size))`, зажатый в диапазон классов.
    pub fn find_class(&self, size: usize) -> Option<usize> {
        if size > self.max_size {
            return None;
        }
        let last = self.classes.len() - 1;
        let ratio = size.div_ceil(self.min_size).max(1);
        let idx = ratio
            .checked_next_power_of_two()
            .map_or(last, |pow| pow.trailing_zeros() as usize);
        Some(idx.min(last))
    }

    /// Буфер длины ровно `size`. Содержимое переиспользованного буфера не обнуляется.
    pub fn get(&self, size: usize) -> Vec<u8> {
        let Some(idx) = self.find_class(size) else {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            return vec![0; size];
        };

        let class = &self.classes[idx];
        let mut buf = match class.free.pop() {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                vec![0; class.capacity]
            }
        };
        buf.truncate(size);
        buf
    }

    /// Вернуть буфер в класс по его ёмкости (не длине).
    /// Слишком большие, чужие без подходящего класса и не влезшие
    /// в заполненный класс буферы отбрасываются.
    pub fn put(&self, mut buf: Vec<u8>) {
        let capacity = buf.capacity();
        let Some(idx) = self.class_for_capacity(capacity) else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        };

        buf.resize(capacity, 0);
        if self.classes[idx].free.push(buf).is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Класс, который буфер этой ёмкости гарантированно обслужит
    fn class_for_capacity(&self, capacity: usize) -> Option<usize> {
        let idx = self.find_class(capacity)?;
        if self.classes[idx].capacity <= capacity {
            return Some(idx);
        }
        idx.checked_sub(1)
    }

    /// Буфер, возвращающийся в пул при дропе
    pub fn get_pooled(&self, size: usize) -> PooledBuffer<'_> {
        PooledBuffer {
            pool: self,
            buf: Some(self.get(size)),
        }
    }

    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            allocations: self.allocations.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}


pub struct PooledBuffer<'a> {
    pool: &'a SizeClassPool,
    buf: Option<Vec<u8>>,
}

impl PooledBuffer<'_> {
    /// Забрать буфер из-под возврата в пул
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        // Some до дропа или into_inner
        self.buf.as_ref().unwrap_or(&EMPTY)
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.get_or_insert_with(Vec::new)
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

static EMPTY: Vec<u8> = Vec::new();
