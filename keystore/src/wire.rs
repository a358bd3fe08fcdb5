//! Byte-stream codec for primitives, keys, and key-sets.
//!
//! All multi-byte primitives are little-endian; variable-length values are
//! length-prefixed. Grounded on the `byteorder` crate's `ReadBytesExt` /
//! `WriteBytesExt`, the same idiom the wider example corpus uses for a
//! hand-framed binary protocol (no `serde`: the wire shapes here are
//! small, fixed, and not worth a derive).

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{self, Error, Result};
use crate::key::Key;
use crate::keyset::KeySet;
use crate::metadata::Metadata;
use crate::value::Value;

const VALUE_TAG_STRING: u8 = 0;
const VALUE_TAG_BINARY: u8 = 1;

fn io_err(source: std::io::Error) -> Error {
    Error::Io { source }
}

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<()> {
    w.write_i32::<LittleEndian>(v).map_err(io_err)
}

pub fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    r.read_i32::<LittleEndian>().map_err(io_err)
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_u32::<LittleEndian>(v).map_err(io_err)
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    r.read_u32::<LittleEndian>().map_err(io_err)
}

pub fn write_i64<W: Write>(w: &mut W, v: i64) -> Result<()> {
    w.write_i64::<LittleEndian>(v).map_err(io_err)
}

pub fn read_i64<R: Read>(r: &mut R) -> Result<i64> {
    r.read_i64::<LittleEndian>().map_err(io_err)
}

/// `u32` length (including the implied terminator) then raw bytes; the
/// last byte written is always zero.
pub fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let len = s.len() as u32 + 1;
    write_u32(w, len)?;
    w.write_all(s.as_bytes()).map_err(io_err)?;
    w.write_u8(0).map_err(io_err)
}

pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = read_u32(r)? as usize;
    if len == 0 {
        return error::ProtocolSnafu {
            msg: "string length must include terminator",
        }
        .fail();
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(io_err)?;
    if buf[len - 1] != 0 {
        return error::ProtocolSnafu {
            msg: "string is not NUL-terminated",
        }
        .fail();
    }
    String::from_utf8(buf[..len - 1].to_vec()).map_err(|_| {
        error::ProtocolSnafu {
            msg: "string is not valid UTF-8",
        }
        .build()
    })
}

/// `u32` length then raw bytes, no terminator implied.
pub fn write_binary<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    write_u32(w, bytes.len() as u32)?;
    w.write_all(bytes).map_err(io_err)
}

pub fn read_binary<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf)
}

fn write_value<W: Write>(w: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::String(s) => {
            w.write_u8(VALUE_TAG_STRING).map_err(io_err)?;
            write_string(w, s)
        }
        Value::Binary(b) => {
            w.write_u8(VALUE_TAG_BINARY).map_err(io_err)?;
            write_binary(w, b)
        }
    }
}

fn read_value<R: Read>(r: &mut R) -> Result<Value> {
    let tag = r.read_u8().map_err(io_err)?;
    match tag {
        VALUE_TAG_STRING => Ok(Value::String(read_string(r)?)),
        VALUE_TAG_BINARY => Ok(Value::Binary(read_binary(r)?)),
        other => error::ProtocolSnafu {
            msg: format!("unknown value tag {}", other),
        }
        .fail(),
    }
}

/// Canonical name as `string`, value tag + value, metadata count as `u32`,
/// then that many `{string, tagged value}` pairs.
pub fn write_key<W: Write>(w: &mut W, key: &Key) -> Result<()> {
    write_string(w, &key.name().canonical())?;
    write_value(w, &key.value())?;
    let metadata = key.metadata();
    write_u32(w, metadata.len() as u32)?;
    for (name, value) in metadata.iter() {
        write_string(w, name)?;
        write_value(w, value)?;
    }
    Ok(())
}

pub fn read_key<R: Read>(r: &mut R) -> Result<Key> {
    let name = read_string(r)?;
    let key = Key::new(&name);
    let value = read_value(r)?;
    key.set_value(value);
    let mut metadata = Metadata::new();
    let count = read_u32(r)?;
    for _ in 0..count {
        let mname = read_string(r)?;
        let mvalue = read_value(r)?;
        metadata.set(&mname, mvalue);
    }
    for (mname, mvalue) in metadata.iter() {
        key.set_metadata(mname, mvalue.clone());
    }
    Ok(key)
}

/// `u32` count then that many keys.
pub fn write_keyset<W: Write>(w: &mut W, keyset: &KeySet) -> Result<()> {
    write_u32(w, keyset.len() as u32)?;
    for key in keyset.iter() {
        write_key(w, key)?;
    }
    Ok(())
}

pub fn read_keyset<R: Read>(r: &mut R) -> Result<KeySet> {
    let count = read_u32(r)?;
    let mut ks = KeySet::new();
    for _ in 0..count {
        ks.append(read_key(r)?);
    }
    Ok(ks)
}
