//! Heap page layout:
//!
//! +------------------+
//! | Header Bitmap    |  (ceil(num_slots / 8) bytes)
//! +------------------+
//! | [slot 0]         |  (tuple width bytes each)
//! | [slot 1]         |
//! | ...              |
//! | [slot n-1]       |
//! +------------------+
//! | Zero Padding     |  (whatever is left of the page)
//! +------------------+
//!
//! Bit `i` of the header (`header[i / 8] & (1 << (i % 8))`) is set when slot
//! `i` holds a tuple. Empty slots and unused header bits are always zero, so
//! encoding a decoded page reproduces its bytes exactly.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::common::{DbError, PageId, RecordId, Result, TransactionId};
use crate::tuple::{Schema, Tuple};

/// Returns how many tuples of `tuple_size` bytes fit on a page of `page_size` bytes.
/// Each tuple costs its width plus one header bit. Slot numbers are `u16`, so
/// callers must reject layouts with more than `MAX_SLOTS` slots.
pub fn slot_capacity(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Largest slot count a record id can address.
pub const MAX_SLOTS: usize = u16::MAX as usize + 1;

/// Returns the number of header bytes needed to track `num_slots` slots.
pub fn header_len(num_slots: usize) -> usize {
    (num_slots + 7) / 8
}

/// A decoded page of one table, holding fixed-width tuples in numbered slots.
///
/// Pages are owned by the buffer pool; the schema comes from the catalog and
/// is never stored in the page bytes.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    /// One entry per slot; `None` is an empty slot
    slots: Vec<Option<Tuple>>,
    /// Transaction that last dirtied this page
    dirtied_by: Option<TransactionId>,
    /// Encoded page as of the last `set_before_image`
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Creates an empty page.
    pub fn empty(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Self {
        let num_slots = slot_capacity(page_size, schema.byte_size());
        Self {
            page_id,
            schema,
            page_size,
            slots: vec![None; num_slots],
            dirtied_by: None,
            before_image: Self::empty_page_data(page_size),
        }
    }

    /// Returns the bytes of a page with no tuples.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Decodes a page. `data` must be exactly one page long.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let page_size = data.len();
        let tuple_size = schema.byte_size();
        let num_slots = slot_capacity(page_size, tuple_size);
        let hlen = header_len(num_slots);
        let invalid = |reason: String| DbError::InvalidPage { page_id, reason };

        if num_slots > MAX_SLOTS {
            return Err(invalid(format!("{} slots exceed the addressable {}", num_slots, MAX_SLOTS)));
        }
        if page_size < hlen + num_slots * tuple_size {
            return Err(invalid(format!("{} bytes is too short", page_size)));
        }

        let header = &data[..hlen];
        for i in num_slots..hlen * 8 {
            if header[i / 8] & (1 << (i % 8)) != 0 {
                return Err(invalid(format!("header bit {} is past the last slot", i)));
            }
        }

        let mut slots = Vec::with_capacity(num_slots);
        let mut body = &data[hlen..];
        for i in 0..num_slots {
            if header[i / 8] & (1 << (i % 8)) == 0 {
                body = &body[tuple_size..];
                slots.push(None);
                continue;
            }
            let mut tuple = Tuple::deserialize(schema.clone(), &mut body)
                .map_err(|e| invalid(format!("slot {}: {}", i, e)))?;
            tuple.set_record_id(Some(RecordId::new(page_id, i as u16)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            schema,
            page_size,
            slots,
            dirtied_by: None,
            before_image: data.to_vec(),
        })
    }

    /// Encodes the page. The result is always exactly `page_size` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tuple_size = self.schema.byte_size();
        let mut header = vec![0u8; header_len(self.slots.len())];
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                header[i / 8] |= 1 << (i % 8);
            }
        }

        let mut buf = BytesMut::with_capacity(self.page_size);
        buf.put_slice(&header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.serialize(&mut buf),
                None => buf.put_bytes(0, tuple_size),
            }
        }
        buf.put_bytes(0, self.page_size - buf.len());
        buf.to_vec()
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the total number of slots on this page.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of empty slots.
    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Returns whether slot `i` holds a tuple. Out-of-range slots are unused.
    pub fn is_slot_used(&self, i: usize) -> bool {
        matches!(self.slots.get(i), Some(Some(_)))
    }

    /// Returns the tuple in slot `i`, if any.
    pub fn tuple(&self, i: usize) -> Option<&Tuple> {
        self.slots.get(i).and_then(Option::as_ref)
    }

    /// Iterates over live tuples in slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Stores `tuple` in the lowest empty slot and records its location on it.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if **tuple.schema() != *self.schema {
            return Err(DbError::SchemaMismatch);
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(DbError::PageFull(self.page_id))?;

        let slot_no = u16::try_from(slot).map_err(|_| DbError::PageFull(self.page_id))?;
        let rid = RecordId::new(self.page_id, slot_no);
        tuple.set_record_id(Some(rid));
        self.slots[slot] = Some(tuple.clone());
        Ok(rid)
    }

    /// Empties the slot named by the tuple's record id and clears that id.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(DbError::TupleNotOnPage)?;
        if rid.page_id != self.page_id || **tuple.schema() != *self.schema {
            return Err(DbError::TupleNotOnPage);
        }
        match self.slots.get_mut(rid.slot as usize) {
            Some(slot @ Some(_)) => *slot = None,
            _ => return Err(DbError::TupleNotOnPage),
        }
        tuple.set_record_id(None);
        Ok(())
    }

    /// Tags the page as dirtied by `tid`, or clears the tag.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtied_by = dirty.then_some(tid);
    }

    /// Returns the transaction that dirtied the page, if it is dirty.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }

    /// Snapshots the current contents as the rollback target.
    pub fn set_before_image(&mut self) {
        self.before_image = self.to_bytes();
    }

    /// Returns a page decoded from the last snapshot.
    pub fn before_image(&self) -> Result<HeapPage> {
        HeapPage::from_bytes(self.page_id, self.schema.clone(), &self.before_image)
    }

    /// Replaces the contents with the last snapshot and clears the dirty tag.
    pub fn restore_before_image(&mut self) -> Result<()> {
        let restored = self.before_image()?;
        self.slots = restored.slots;
        self.dirtied_by = None;
        Ok(())
    }
}
