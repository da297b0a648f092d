//! The structure engine: binds a [`Description`] to a byte range and
//! exposes typed field accessors.
//!
//! Grounded on the `structure`/`struct_description_t` pairing
//! (`prinbee/data/schema.cpp`) and on `Row::load`/`Record::save`'s
//! field-by-field walk (`table.rs`) for the "re-decode with the old
//! description, re-encode with the new one" version-negotiation idiom.
//! Dispatch is a `match` over a closed [`FieldType`] tagged sum rather than
//! a raw type code plus reinterpret-cast.

use crate::block::BlockHandle;
use crate::error::{CoreError, Result};
use crate::fieldtype::{Description, FieldDescriptor, FieldType};
use crate::util::{bitmask, getbits, setbits};
use crate::vbuffer::VirtualBuffer;
use parking_lot::Mutex;
use std::sync::Arc;

/// Where a [`Structure`]'s bytes actually live. A tagged sum over the three
/// concrete backings this crate needs: owned directly by a block, accessed
/// through a virtual buffer, or (added here) an `Owned` variant for
/// structures built entirely in memory (nested sub-structures, schema
/// blocks under construction, tests).
#[derive(Clone)]
pub enum Backing {
    Block(BlockHandle),
    Virtual(Arc<Mutex<VirtualBuffer>>),
    Owned(Arc<Mutex<Vec<u8>>>),
}

impl Backing {
    /// A fresh, empty, heap-backed structure store.
    pub fn owned() -> Self {
        Backing::Owned(Arc::new(Mutex::new(Vec::new())))
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            Backing::Block(b) => b.read(offset, buf),
            Backing::Virtual(v) => {
                v.lock().pread(buf, offset, true)?;
                Ok(())
            }
            Backing::Owned(d) => {
                let data = d.lock();
                let off = offset as usize;
                if off + buf.len() > data.len() {
                    return Err(CoreError::InvalidSize(format!(
                        "read past end of owned structure buffer at offset {offset}"
                    )));
                }
                buf.copy_from_slice(&data[off..off + buf.len()]);
                Ok(())
            }
        }
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        match self {
            Backing::Block(b) => b.write(offset, buf),
            Backing::Virtual(v) => {
                v.lock().pwrite(buf, offset, true)?;
                Ok(())
            }
            Backing::Owned(d) => {
                let mut data = d.lock();
                let end = offset as usize + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset as usize..end].copy_from_slice(buf);
                Ok(())
            }
        }
    }
}

/// Runtime binding between a [`Description`] and a [`Backing`] byte range.
#[derive(Clone)]
pub struct Structure {
    description: Arc<Description>,
    version: u32,
    backing: Backing,
    base: u64,
}

impl Structure {
    /// Bind `description` to `backing`, interpreting it at structure
    /// version `version` (fields outside `[min_version, max_version]` are
    /// absent).
    pub fn new(description: Arc<Description>, version: u32, backing: Backing) -> Self {
        Self {
            description,
            version,
            backing,
            base: 0,
        }
    }

    fn with_base(&self, description: Arc<Description>, base: u64) -> Self {
        Self {
            description,
            version: self.version,
            backing: self.backing.clone(),
            base,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Byte distance from the start of this structure to the first dynamic
    /// field, or the whole static size when there is no dynamic field.
    pub fn get_static_size(&self) -> u64 {
        self.description.static_size()
    }

    fn find_field(&self, name: &str) -> Result<(usize, &FieldDescriptor)> {
        let base_name = name.split(['.', '[']).next().unwrap_or(name);
        self.description
            .fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == base_name && f.present_at(self.version))
            .ok_or_else(|| CoreError::FieldNotFound(name.to_string()))
    }

    fn field_offset(&self, idx: usize) -> Result<u64> {
        let mut offset = self.base;
        for f in self
            .description
            .fields
            .iter()
            .take(idx)
            .filter(|f| f.present_at(self.version))
        {
            offset += self.consumed_len(f, offset)?;
        }
        Ok(offset)
    }

    fn element_size(&self, sub: &Description) -> Result<u64> {
        if sub.is_fully_static() {
            Ok(sub.static_size())
        } else {
            Err(CoreError::NotYetImplemented(
                "variable-size array elements".to_string(),
            ))
        }
    }

    fn consumed_len(&self, f: &FieldDescriptor, at: u64) -> Result<u64> {
        if let Some(w) = f.field_type.static_width() {
            return Ok(w);
        }
        match &f.field_type {
            FieldType::P8String | FieldType::Buffer8 => {
                let mut b = [0u8; 1];
                self.backing.read(at, &mut b)?;
                Ok(1 + b[0] as u64)
            }
            FieldType::P16String | FieldType::Buffer16 => {
                let mut b = [0u8; 2];
                self.backing.read(at, &mut b)?;
                Ok(2 + u16::from_le_bytes(b) as u64)
            }
            FieldType::Buffer32 => {
                let mut b = [0u8; 4];
                self.backing.read(at, &mut b)?;
                Ok(4 + u32::from_le_bytes(b) as u64)
            }
            FieldType::Array8(sub) => {
                let mut b = [0u8; 1];
                self.backing.read(at, &mut b)?;
                Ok(1 + b[0] as u64 * self.element_size(sub)?)
            }
            FieldType::Array16(sub) => {
                let mut b = [0u8; 2];
                self.backing.read(at, &mut b)?;
                Ok(2 + u16::from_le_bytes(b) as u64 * self.element_size(sub)?)
            }
            FieldType::Array32(sub) => {
                let mut b = [0u8; 4];
                self.backing.read(at, &mut b)?;
                Ok(4 + u32::from_le_bytes(b) as u64 * self.element_size(sub)?)
            }
            FieldType::Structure(sub) => {
                if sub.is_fully_static() {
                    Ok(sub.static_size())
                } else {
                    Err(CoreError::NotYetImplemented(
                        "offset past a dynamically-sized nested structure".to_string(),
                    ))
                }
            }
            FieldType::End => Ok(0),
            _ => unreachable!("static-width types are handled above"),
        }
    }

    fn read_n(&self, offset: u64, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.backing.read(offset, &mut buf)?;
        Ok(buf)
    }

    /// Grow or shrink the bytes occupied by a dynamic field. Block-backed
    /// structures cannot resize in place; they only accept same-length
    /// rewrites.
    fn resize_field(&self, offset: u64, old_len: u64, new_len: u64) -> Result<()> {
        if old_len == new_len {
            return Ok(());
        }
        match &self.backing {
            Backing::Virtual(v) => {
                let mut vb = v.lock();
                if new_len > old_len {
                    let zeros = vec![0u8; (new_len - old_len) as usize];
                    vb.pinsert(&zeros, offset + old_len)?;
                } else {
                    vb.perase(old_len - new_len, offset + new_len);
                }
                Ok(())
            }
            Backing::Owned(d) => {
                let mut data = d.lock();
                if new_len > old_len {
                    let at = (offset + old_len) as usize;
                    let delta = (new_len - old_len) as usize;
                    data.splice(at..at, std::iter::repeat(0u8).take(delta));
                } else {
                    let start = (offset + new_len) as usize;
                    let end = (offset + old_len) as usize;
                    data.drain(start..end);
                }
                Ok(())
            }
            Backing::Block(_) => Err(CoreError::NotYetImplemented(
                "resizing a dynamic field directly inside a fixed block page".to_string(),
            )),
        }
    }

    fn expect_uint_width(field: &FieldDescriptor) -> Result<u64> {
        match &field.field_type {
            FieldType::UInt8 => Ok(1),
            FieldType::UInt16 => Ok(2),
            FieldType::UInt32 => Ok(4),
            FieldType::UInt64
            | FieldType::Reference
            | FieldType::Oid
            | FieldType::Time
            | FieldType::MsTime
            | FieldType::UsTime
            | FieldType::NsTime => Ok(8),
            other => Err(CoreError::TypeMismatch {
                field: field.name.clone(),
                expected: "uinteger",
                found: other.kind_name(),
            }),
        }
    }

    /// Typed unsigned read. Supports a dotted `group.sub` name to read one
    /// named sub-field out of a `Bits` group.
    pub fn get_uinteger(&self, name: &str) -> Result<u64> {
        if let Some((group, sub)) = name.split_once('.') {
            return self.get_bits_subfield(group, sub);
        }
        let (idx, field) = self.find_field(name)?;
        let width = Self::expect_uint_width(field)?;
        let offset = self.field_offset(idx)?;
        Ok(crate::util::get(&self.read_n(offset, width as usize)?, 0, width as usize))
    }

    /// Typed unsigned write, mirroring [`Structure::get_uinteger`].
    pub fn set_uinteger(&self, name: &str, value: u64) -> Result<()> {
        if let Some((group, sub)) = name.split_once('.') {
            return self.set_bits_subfield(group, sub, value);
        }
        let (idx, field) = self.find_field(name)?;
        let width = Self::expect_uint_width(field)?;
        let offset = self.field_offset(idx)?;
        let mut buf = vec![0u8; width as usize];
        crate::util::set(&mut buf, 0, value, width as usize);
        self.backing.write(offset, &buf)
    }

    fn bits_field(&self, group: &str) -> Result<(usize, u32, Vec<crate::fieldtype::BitSubField>)> {
        let (idx, field) = self.find_field(group)?;
        match &field.field_type {
            FieldType::Bits { width, subfields } => Ok((idx, *width, subfields.clone())),
            other => Err(CoreError::TypeMismatch {
                field: group.to_string(),
                expected: "bits",
                found: other.kind_name(),
            }),
        }
    }

    fn get_bits_subfield(&self, group: &str, sub: &str) -> Result<u64> {
        let (idx, width, subfields) = self.bits_field(group)?;
        let offset = self.field_offset(idx)?;
        let nbytes = ((width as u64) + 7) / 8;
        let word = crate::util::get(&self.read_n(offset, nbytes as usize)?, 0, nbytes as usize);
        let mut bit_off = 0u32;
        for sf in &subfields {
            if sf.name == sub {
                return Ok(getbits!(word, bit_off, sf.width));
            }
            bit_off += sf.width;
        }
        Err(CoreError::FieldNotFound(format!("{group}.{sub}")))
    }

    fn set_bits_subfield(&self, group: &str, sub: &str, value: u64) -> Result<()> {
        let (idx, width, subfields) = self.bits_field(group)?;
        let offset = self.field_offset(idx)?;
        let nbytes = ((width as u64) + 7) / 8;
        let mut word = crate::util::get(&self.read_n(offset, nbytes as usize)?, 0, nbytes as usize);
        let mut bit_off = 0u32;
        let mut found = false;
        for sf in &subfields {
            if sf.name == sub {
                let mask = bitmask!(0, sf.width);
                if value > mask {
                    return Err(CoreError::OutOfRange(format!(
                        "value {value} does not fit in {}-bit sub-field {group}.{sub}",
                        sf.width
                    )));
                }
                setbits!(word, bit_off, sf.width, value);
                found = true;
                break;
            }
            bit_off += sf.width;
        }
        if !found {
            return Err(CoreError::FieldNotFound(format!("{group}.{sub}")));
        }
        let mut buf = vec![0u8; nbytes as usize];
        crate::util::set(&mut buf, 0, word, nbytes as usize);
        self.backing.write(offset, &buf)
    }

    /// Typed signed read.
    pub fn get_integer(&self, name: &str) -> Result<i64> {
        let (idx, field) = self.find_field(name)?;
        let width = match &field.field_type {
            FieldType::Int8 => 1,
            FieldType::Int16 => 2,
            FieldType::Int32 => 4,
            FieldType::Int64 => 8,
            other => {
                return Err(CoreError::TypeMismatch {
                    field: name.to_string(),
                    expected: "integer",
                    found: other.kind_name(),
                })
            }
        };
        let offset = self.field_offset(idx)?;
        Ok(crate::util::iget(&self.read_n(offset, width)?, 0, width))
    }

    /// Typed signed write.
    pub fn set_integer(&self, name: &str, value: i64) -> Result<()> {
        let (idx, field) = self.find_field(name)?;
        let width = match &field.field_type {
            FieldType::Int8 => 1,
            FieldType::Int16 => 2,
            FieldType::Int32 => 4,
            FieldType::Int64 => 8,
            other => {
                return Err(CoreError::TypeMismatch {
                    field: name.to_string(),
                    expected: "integer",
                    found: other.kind_name(),
                })
            }
        };
        let offset = self.field_offset(idx)?;
        let mut buf = vec![0u8; width];
        crate::util::iset(&mut buf, 0, value, width);
        self.backing.write(offset, &buf)
    }

    fn string_prefix_width(field: &FieldDescriptor) -> Result<u64> {
        match &field.field_type {
            FieldType::P8String => Ok(1),
            FieldType::P16String => Ok(2),
            other => Err(CoreError::TypeMismatch {
                field: field.name.clone(),
                expected: "string",
                found: other.kind_name(),
            }),
        }
    }

    /// Read a `P8STRING`/`P16STRING` field as UTF-8. A malformed stored
    /// value is a `type_mismatch`, not a panic — bytes on disk may be
    /// corrupt independent of any programming error.
    pub fn get_string(&self, name: &str) -> Result<String> {
        let (idx, field) = self.find_field(name)?;
        let prefix = Self::string_prefix_width(field)?;
        let offset = self.field_offset(idx)?;
        let len = self.consumed_len(field, offset)? - prefix;
        let bytes = self.read_n(offset + prefix, len as usize)?;
        String::from_utf8(bytes).map_err(|_| CoreError::TypeMismatch {
            field: name.to_string(),
            expected: "utf8 string",
            found: "invalid utf8",
        })
    }

    /// Write a `P8STRING`/`P16STRING` field, growing or shrinking the
    /// backing as needed (block-backed structures cannot resize; see
    /// [`Structure::resize_field`]).
    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let (idx, field) = self.find_field(name)?;
        let prefix = Self::string_prefix_width(field)?;
        let bytes = value.as_bytes();
        let max = (1u64 << (prefix * 8)) - 1;
        if bytes.len() as u64 > max {
            return Err(CoreError::OutOfRange(format!(
                "string value for {name} exceeds {max} bytes"
            )));
        }
        let offset = self.field_offset(idx)?;
        let old_len = self.consumed_len(field, offset)?;
        let new_len = prefix + bytes.len() as u64;
        self.resize_field(offset, old_len, new_len)?;
        let mut buf = Vec::with_capacity(new_len as usize);
        match prefix {
            1 => buf.push(bytes.len() as u8),
            2 => buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes()),
            _ => unreachable!(),
        }
        buf.extend_from_slice(bytes);
        self.backing.write(offset, &buf)
    }

    fn buffer_prefix_width(field: &FieldDescriptor) -> Result<u64> {
        match &field.field_type {
            FieldType::Buffer8 => Ok(1),
            FieldType::Buffer16 => Ok(2),
            FieldType::Buffer32 => Ok(4),
            other => Err(CoreError::TypeMismatch {
                field: field.name.clone(),
                expected: "buffer",
                found: other.kind_name(),
            }),
        }
    }

    /// Read a `BUFFERn` field's raw bytes.
    pub fn get_buffer(&self, name: &str) -> Result<Vec<u8>> {
        let (idx, field) = self.find_field(name)?;
        let prefix = Self::buffer_prefix_width(field)?;
        let offset = self.field_offset(idx)?;
        let len = self.consumed_len(field, offset)? - prefix;
        self.read_n(offset + prefix, len as usize)
    }

    /// Write a `BUFFERn` field's raw bytes.
    pub fn set_buffer(&self, name: &str, value: &[u8]) -> Result<()> {
        let (idx, field) = self.find_field(name)?;
        let prefix = Self::buffer_prefix_width(field)?;
        let max = (1u64 << (prefix * 8)) - 1;
        if value.len() as u64 > max {
            return Err(CoreError::OutOfRange(format!(
                "buffer value for {name} exceeds {max} bytes"
            )));
        }
        let offset = self.field_offset(idx)?;
        let old_len = self.consumed_len(field, offset)?;
        let new_len = prefix + value.len() as u64;
        self.resize_field(offset, old_len, new_len)?;
        let mut buf = Vec::with_capacity(new_len as usize);
        match prefix {
            1 => buf.push(value.len() as u8),
            2 => buf.extend_from_slice(&(value.len() as u16).to_le_bytes()),
            4 => buf.extend_from_slice(&(value.len() as u32).to_le_bytes()),
            _ => unreachable!(),
        }
        buf.extend_from_slice(value);
        self.backing.write(offset, &buf)
    }

    /// Read a `VERSION` field as `(major, minor)`.
    pub fn get_version(&self, name: &str) -> Result<(u16, u16)> {
        let (idx, field) = self.find_field(name)?;
        if field.field_type != FieldType::Version {
            return Err(CoreError::TypeMismatch {
                field: name.to_string(),
                expected: "version",
                found: field.field_type.kind_name(),
            });
        }
        let offset = self.field_offset(idx)?;
        let bytes = self.read_n(offset, 4)?;
        Ok((
            u16::from_le_bytes(bytes[0..2].try_into().unwrap()),
            u16::from_le_bytes(bytes[2..4].try_into().unwrap()),
        ))
    }

    /// Write a `VERSION` field.
    pub fn set_version(&self, name: &str, value: (u16, u16)) -> Result<()> {
        let (idx, field) = self.find_field(name)?;
        if field.field_type != FieldType::Version {
            return Err(CoreError::TypeMismatch {
                field: name.to_string(),
                expected: "version",
                found: field.field_type.kind_name(),
            });
        }
        let offset = self.field_offset(idx)?;
        let mut buf = [0u8; 4];
        buf[0..2].copy_from_slice(&value.0.to_le_bytes());
        buf[2..4].copy_from_slice(&value.1.to_le_bytes());
        self.backing.write(offset, &buf)
    }

    fn array_field(&self, name: &str) -> Result<(usize, u64, Arc<Description>)> {
        let (idx, field) = self.find_field(name)?;
        let prefix = match &field.field_type {
            FieldType::Array8(_) => 1,
            FieldType::Array16(_) => 2,
            FieldType::Array32(_) => 4,
            other => {
                return Err(CoreError::TypeMismatch {
                    field: name.to_string(),
                    expected: "array",
                    found: other.kind_name(),
                })
            }
        };
        let sub = match &field.field_type {
            FieldType::Array8(s) | FieldType::Array16(s) | FieldType::Array32(s) => {
                Arc::new((**s).clone())
            }
            _ => unreachable!(),
        };
        Ok((idx, prefix, sub))
    }

    /// Number of elements currently stored in an `ARRAYn` field.
    pub fn get_array_len(&self, name: &str) -> Result<u32> {
        let (idx, prefix, _) = self.array_field(name)?;
        let offset = self.field_offset(idx)?;
        let buf = self.read_n(offset, prefix as usize)?;
        Ok(crate::util::get(&buf, 0, prefix as usize) as u32)
    }

    /// Append one zero-filled element to an `ARRAYn` field and return its
    /// index. Only supported for fully statically-sized elements.
    pub fn new_array_item(&self, name: &str) -> Result<u32> {
        let (idx, prefix, sub) = self.array_field(name)?;
        let elem_size = self.element_size(&sub)?;
        let offset = self.field_offset(idx)?;
        let count = crate::util::get(&self.read_n(offset, prefix as usize)?, 0, prefix as usize);
        let insert_at = offset + prefix + count * elem_size;
        self.resize_field(insert_at, 0, elem_size)?;
        let mut prefix_buf = vec![0u8; prefix as usize];
        crate::util::set(&mut prefix_buf, 0, count + 1, prefix as usize);
        self.backing.write(offset, &prefix_buf)?;
        Ok(count as u32)
    }

    /// Borrow array element `index` as its own sub-[`Structure`].
    pub fn get_array_item(&self, name: &str, index: u32) -> Result<Structure> {
        let (idx, prefix, sub) = self.array_field(name)?;
        let elem_size = self.element_size(&sub)?;
        let offset = self.field_offset(idx)?;
        let count = crate::util::get(&self.read_n(offset, prefix as usize)?, 0, prefix as usize);
        if index as u64 >= count {
            return Err(CoreError::OutOfRange(format!(
                "array index {index} out of range (len {count}) for field {name}"
            )));
        }
        let elem_offset = offset + prefix + index as u64 * elem_size;
        Ok(self.with_base(sub, elem_offset))
    }

    /// Borrow a nested `STRUCTURE` field as its own sub-[`Structure`].
    pub fn get_nested(&self, name: &str) -> Result<Structure> {
        let (idx, field) = self.find_field(name)?;
        let sub = match &field.field_type {
            FieldType::Structure(s) => Arc::new((**s).clone()),
            other => {
                return Err(CoreError::TypeMismatch {
                    field: name.to_string(),
                    expected: "structure",
                    found: other.kind_name(),
                })
            }
        };
        let offset = self.field_offset(idx)?;
        Ok(self.with_base(sub, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldtype::FieldDescriptor as FD;

    fn description() -> Arc<Description> {
        Arc::new(Description::new_nested(vec![
            FD::always("count", FieldType::UInt32),
            FD::bits("flags=alpha:3/beta", 8, 0, u32::MAX),
            FD::always("label", FieldType::P8String),
            FD::always("id", FieldType::UInt64),
            FD::always("end", FieldType::End),
        ]))
    }

    #[test]
    fn fixed_and_string_fields_round_trip() {
        let s = Structure::new(description(), 0, Backing::owned());
        s.set_uinteger("count", 7).unwrap();
        s.set_uinteger("flags.alpha", 5).unwrap();
        s.set_uinteger("flags.beta", 1).unwrap();
        s.set_string("label", "hello").unwrap();
        s.set_uinteger("id", 0xdead_beef).unwrap();

        assert_eq!(s.get_uinteger("count").unwrap(), 7);
        assert_eq!(s.get_uinteger("flags.alpha").unwrap(), 5);
        assert_eq!(s.get_uinteger("flags.beta").unwrap(), 1);
        assert_eq!(s.get_string("label").unwrap(), "hello");
        assert_eq!(s.get_uinteger("id").unwrap(), 0xdead_beef);
    }

    #[test]
    fn bit_subfield_out_of_range_rejected() {
        let s = Structure::new(description(), 0, Backing::owned());
        assert!(s.set_uinteger("flags.alpha", 8).is_err());
    }

    #[test]
    fn resizing_string_shifts_later_fixed_field() {
        let s = Structure::new(description(), 0, Backing::owned());
        s.set_uinteger("count", 1).unwrap();
        s.set_string("label", "x").unwrap();
        s.set_uinteger("id", 42).unwrap();
        s.set_string("label", "a longer label").unwrap();
        assert_eq!(s.get_string("label").unwrap(), "a longer label");
        assert_eq!(s.get_uinteger("id").unwrap(), 42);
    }

    #[test]
    fn field_not_found_is_reported() {
        let s = Structure::new(description(), 0, Backing::owned());
        assert!(matches!(
            s.get_uinteger("nope"),
            Err(CoreError::FieldNotFound(_))
        ));
    }
}
