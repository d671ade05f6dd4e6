//! Binary encoding of a page slot.
//!
//! ```text
//! int32 record_count
//! per record:
//!     int32 bitmap_length
//!     bitmap_length x int32  (1 present, 0 null)
//!     present values in schema order
//! ```
//!
//! All integers are big-endian. Text is an int32 code-unit count followed by UTF-16 code
//! units.

use crate::access::{DataType, Record, Value};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId};
use bytes::{Buf, BufMut, BytesMut};

/// Serialize a page's records. The result is not padded to the page size.
pub fn encode_page(page: &Page, layout: &[DataType]) -> StorageResult<BytesMut> {
    let mut buf = BytesMut::with_capacity(page.page_size());
    buf.put_i32(page.record_count() as i32);

    for record in page.records() {
        if record.len() != layout.len() {
            return Err(StorageError::Corrupt(format!(
                "record has {} fields, table layout has {}",
                record.len(),
                layout.len()
            )));
        }

        buf.put_i32(record.len() as i32);
        for present in record.presence() {
            buf.put_i32(present as i32);
        }

        for (value, data_type) in record.values().iter().zip(layout) {
            encode_value(&mut buf, value, *data_type)?;
        }
    }

    Ok(buf)
}

fn encode_value(buf: &mut BytesMut, value: &Value, data_type: DataType) -> StorageResult<()> {
    match (value, data_type) {
        (Value::Null, _) => {}
        (Value::Integer(i), DataType::Integer) => buf.put_i32(*i),
        (Value::Double(d), DataType::Double) => buf.put_f64(*d),
        (Value::Boolean(b), DataType::Boolean) => buf.put_i32(*b as i32),
        (Value::Text(s), DataType::Char(_) | DataType::Varchar(_)) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            buf.put_i32(units.len() as i32);
            for unit in units {
                buf.put_u16(unit);
            }
        }
        (value, data_type) => {
            return Err(StorageError::Corrupt(format!(
                "value {} does not match column type {}",
                value, data_type
            )));
        }
    }
    Ok(())
}

/// Deserialize a page slot. Trailing padding after the last record is ignored.
pub fn decode_page(
    page_id: PageId,
    page_size: usize,
    mut data: &[u8],
    layout: &[DataType],
) -> StorageResult<Page> {
    let record_count = read_len(&mut data, "record count")?;
    let mut records = Vec::with_capacity(record_count.min(page_size));

    for _ in 0..record_count {
        let bitmap_len = read_len(&mut data, "bitmap length")?;
        if bitmap_len != layout.len() {
            return Err(StorageError::Corrupt(format!(
                "page {}: bitmap of {} entries for a {} column table",
                page_id,
                bitmap_len,
                layout.len()
            )));
        }

        let mut present = Vec::with_capacity(bitmap_len);
        for _ in 0..bitmap_len {
            ensure_remaining(&data, 4, "bitmap entry")?;
            present.push(data.get_i32() != 0);
        }

        let mut values = Vec::with_capacity(layout.len());
        for (data_type, present) in layout.iter().zip(present) {
            if present {
                values.push(decode_value(&mut data, *data_type)?);
            } else {
                values.push(Value::Null);
            }
        }
        records.push(Record::new(values));
    }

    Ok(Page::from_records(page_id, page_size, records))
}

fn decode_value(data: &mut &[u8], data_type: DataType) -> StorageResult<Value> {
    let value = match data_type {
        DataType::Integer => {
            ensure_remaining(data, 4, "integer")?;
            Value::Integer(data.get_i32())
        }
        DataType::Double => {
            ensure_remaining(data, 8, "double")?;
            Value::Double(data.get_f64())
        }
        DataType::Boolean => {
            ensure_remaining(data, 4, "boolean")?;
            Value::Boolean(data.get_i32() != 0)
        }
        DataType::Char(_) | DataType::Varchar(_) => {
            let len = read_len(data, "text length")?;
            ensure_remaining(data, len * 2, "text")?;
            let units: Vec<u16> = (0..len).map(|_| data.get_u16()).collect();
            let text = String::from_utf16(&units)
                .map_err(|e| StorageError::Corrupt(format!("invalid UTF-16 text: {}", e)))?;
            Value::Text(text)
        }
    };
    Ok(value)
}

fn read_len(data: &mut &[u8], what: &str) -> StorageResult<usize> {
    ensure_remaining(data, 4, what)?;
    let len = data.get_i32();
    usize::try_from(len).map_err(|_| StorageError::Corrupt(format!("negative {}: {}", what, len)))
}

fn ensure_remaining(data: &&[u8], needed: usize, what: &str) -> StorageResult<()> {
    if data.remaining() < needed {
        return Err(StorageError::Corrupt(format!(
            "{} needs {} bytes, {} left",
            what,
            needed,
            data.remaining()
        )));
    }
    Ok(())
}
