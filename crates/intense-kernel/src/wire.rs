//! Binary wire codec.
//!
//! All integers are big-endian. Layout:
//!
//! ```text
//! dimension   tag:i32 (0 absent, 1 string, 2 integer)
//!             string:  quoted:u8 len:i32 utf8[len]
//!             integer: value:i32
//! compound    count:i32 dimension[count]
//! base        tag:i32 (0 void, 1 alpha, 2 omega, 3 number, 4 string,
//!             5 binary, 6 bound)
//!             number: f64   string/binary/bound: len:i32 bytes[len]
//! context     basecount:i32 base children:i32 (dimension context)[children]
//! op          flags:i32 (bit0 clear dims, bit1 clear base) blankcount:i32
//!             basecount:i32 base children:i32 (dimension op)[children]
//! ```
//!
//! Every length is checked against [`Limits`] before anything is allocated,
//! and declared counts must match what was actually decoded. Values are
//! decoded into fresh structures, so a failed read leaves nothing behind.

use crate::config::Limits;
use crate::context::Context;
use crate::dimension::{CompoundDimension, Dimension};
use crate::error::{IntenseError, Result};
use crate::op::ContextOp;
use crate::value::{BaseValue, Binder, BoundValue, ValueKind};
use std::collections::BTreeMap;

const DIM_ABSENT: i32 = 0;
const DIM_STRING: i32 = 1;
const DIM_INTEGER: i32 = 2;
const VALUE_VOID: i32 = 0;

const FLAG_CLEAR_DIMS: i32 = 1 << 0;
const FLAG_CLEAR_BASE: i32 = 1 << 1;

pub trait Wire: Sized {
    fn write(&self, w: &mut WireWriter) -> Result<()>;

    fn read(r: &mut WireReader<'_>) -> Result<Self>;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&Limits::default())
    }

    fn to_bytes_with(&self, limits: &Limits) -> Result<Vec<u8>> {
        let mut w = WireWriter::new(*limits);
        self.write(&mut w)?;
        Ok(w.into_bytes())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(bytes, &Limits::default(), None)
    }

    /// Decode exactly one value; trailing bytes are an error.
    fn from_bytes_with(bytes: &[u8], limits: &Limits, binder: Option<&dyn Binder>) -> Result<Self> {
        let mut r = WireReader::new(bytes, *limits);
        if let Some(binder) = binder {
            r = r.with_binder(binder);
        }
        let value = Self::read(&mut r).inspect_err(|e| tracing::debug!("wire decode failed: {e}"))?;
        r.finish()?;
        Ok(value)
    }
}

pub struct WireWriter {
    buf: Vec<u8>,
    limits: Limits,
    depth: usize,
}

impl WireWriter {
    pub fn new(limits: Limits) -> Self {
        Self {
            buf: Vec::new(),
            limits,
            depth: 0,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a count or length, refusing anything the reader would reject.
    fn write_len(&mut self, len: usize, max: usize, what: &str) -> Result<()> {
        if len > max {
            return Err(IntenseError::structural(format!("{what} of {len} exceeds limit {max}")));
        }
        let len = i32::try_from(len)
            .map_err(|_| IntenseError::structural(format!("{what} of {len} does not fit in int32")))?;
        self.write_i32(len);
        Ok(())
    }

    fn write_count(&mut self, count: u64, what: &str) -> Result<()> {
        let count = i32::try_from(count)
            .map_err(|_| IntenseError::structural(format!("{what} of {count} does not fit in int32")))?;
        self.write_i32(count);
        Ok(())
    }

    fn write_payload(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len(), self.limits.max_payload_bytes, "payload length")?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(IntenseError::structural(format!(
                "nesting deeper than {}",
                self.limits.max_depth
            )));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }
}

pub struct WireReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    limits: Limits,
    binder: Option<&'a dyn Binder>,
    depth: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8], limits: Limits) -> Self {
        Self {
            bytes,
            offset: 0,
            limits,
            binder: None,
            depth: 0,
        }
    }

    /// Resolve `Bound` payloads with `binder` while reading.
    pub fn with_binder(mut self, binder: &'a dyn Binder) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn finish(&self) -> Result<()> {
        if self.offset != self.bytes.len() {
            return Err(IntenseError::deserialize(
                self.offset,
                format!("{} trailing bytes", self.bytes.len() - self.offset),
            ));
        }
        Ok(())
    }

    fn error(&self, at: usize, reason: impl Into<String>) -> IntenseError {
        IntenseError::deserialize(at, reason)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or_else(|| self.error(self.offset, "length overflow"))?;
        if end > self.bytes.len() {
            return Err(self.error(self.offset, format!("truncated: need {len} bytes")));
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array::<4>()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array::<8>()?))
    }

    /// Read a length or count and check it against `max`.
    fn read_len(&mut self, max: usize, what: &str) -> Result<usize> {
        let at = self.offset;
        let raw = self.read_i32()?;
        let len = usize::try_from(raw).map_err(|_| self.error(at, format!("negative {what} {raw}")))?;
        if len > max {
            return Err(self.error(at, format!("{what} {len} exceeds limit {max}")));
        }
        Ok(len)
    }

    fn read_count(&mut self, what: &str) -> Result<(usize, u64)> {
        let at = self.offset;
        let raw = self.read_i32()?;
        let count = u64::try_from(raw).map_err(|_| self.error(at, format!("negative {what} {raw}")))?;
        Ok((at, count))
    }

    fn read_payload(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len(self.limits.max_payload_bytes, "payload length")?;
        Ok(self.take(len)?.to_vec())
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(self.error(self.offset, format!("nesting deeper than {}", self.limits.max_depth)));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }
}

fn write_dimension(dim: Option<&Dimension>, w: &mut WireWriter) -> Result<()> {
    match dim {
        None => w.write_i32(DIM_ABSENT),
        Some(Dimension::Integer(i)) => {
            w.write_i32(DIM_INTEGER);
            w.write_i32(*i);
        }
        Some(Dimension::String { value, quoted }) => {
            w.write_i32(DIM_STRING);
            w.write_u8(u8::from(*quoted));
            w.write_len(value.len(), w.limits.max_dimension_bytes, "dimension length")?;
            w.buf.extend_from_slice(value.as_bytes());
        }
    }
    Ok(())
}

fn read_dimension(r: &mut WireReader<'_>) -> Result<Option<Dimension>> {
    let at = r.offset;
    match r.read_i32()? {
        DIM_ABSENT => Ok(None),
        DIM_INTEGER => Ok(Some(Dimension::Integer(r.read_i32()?))),
        DIM_STRING => {
            let flag_at = r.offset;
            let quoted = match r.read_u8()? {
                0 => false,
                1 => true,
                other => return Err(r.error(flag_at, format!("bad quote flag {other}"))),
            };
            let len = r.read_len(r.limits.max_dimension_bytes, "dimension length")?;
            let text_at = r.offset;
            let bytes = r.take(len)?;
            let value = std::str::from_utf8(bytes)
                .map_err(|e| r.error(text_at, format!("dimension is not UTF-8: {e}")))?
                .to_owned();
            Ok(Some(Dimension::String { value, quoted }))
        }
        tag => Err(r.error(at, format!("unknown dimension tag {tag}"))),
    }
}

fn read_present_dimension(r: &mut WireReader<'_>) -> Result<Dimension> {
    let at = r.offset;
    read_dimension(r)?.ok_or_else(|| r.error(at, "absent dimension where one is required"))
}

fn write_base(value: Option<&BaseValue>, w: &mut WireWriter) -> Result<()> {
    let Some(value) = value else {
        w.write_i32(VALUE_VOID);
        return Ok(());
    };
    w.write_i32(value.kind().tag());
    match value {
        BaseValue::Alpha | BaseValue::Omega => {}
        BaseValue::Number(n) => w.write_f64(*n),
        BaseValue::String(s) => w.write_payload(s.as_bytes())?,
        BaseValue::Binary(b) => w.write_payload(b)?,
        BaseValue::Bound(b) => w.write_payload(b.packed())?,
    }
    Ok(())
}

fn read_base(r: &mut WireReader<'_>) -> Result<Option<BaseValue>> {
    let at = r.offset;
    let tag = r.read_i32()?;
    if tag == VALUE_VOID {
        return Ok(None);
    }
    let kind = ValueKind::from_tag(tag).ok_or_else(|| r.error(at, format!("unknown value tag {tag}")))?;
    let value = match kind {
        ValueKind::Alpha => BaseValue::Alpha,
        ValueKind::Omega => BaseValue::Omega,
        ValueKind::Number => BaseValue::Number(r.read_f64()?),
        ValueKind::String => {
            let text_at = r.offset + 4;
            let bytes = r.read_payload()?;
            let s = String::from_utf8(bytes)
                .map_err(|e| r.error(text_at, format!("string is not UTF-8: {e}")))?;
            BaseValue::String(s)
        }
        ValueKind::Binary => BaseValue::Binary(r.read_payload()?),
        ValueKind::Bound => {
            let packed = r.read_payload()?;
            BaseValue::Bound(BoundValue::from_packed(packed, r.binder))
        }
    };
    Ok(Some(value))
}

impl Wire for Dimension {
    fn write(&self, w: &mut WireWriter) -> Result<()> {
        write_dimension(Some(self), w)
    }

    fn read(r: &mut WireReader<'_>) -> Result<Self> {
        read_present_dimension(r)
    }
}

impl Wire for Option<Dimension> {
    fn write(&self, w: &mut WireWriter) -> Result<()> {
        write_dimension(self.as_ref(), w)
    }

    fn read(r: &mut WireReader<'_>) -> Result<Self> {
        read_dimension(r)
    }
}

impl Wire for CompoundDimension {
    fn write(&self, w: &mut WireWriter) -> Result<()> {
        w.write_len(self.len(), w.limits.max_compound_len, "compound length")?;
        for dim in self {
            write_dimension(Some(dim), w)?;
        }
        Ok(())
    }

    fn read(r: &mut WireReader<'_>) -> Result<Self> {
        let len = r.read_len(r.limits.max_compound_len, "compound length")?;
        let mut out = CompoundDimension::new();
        for _ in 0..len {
            out.push(read_present_dimension(r)?);
        }
        Ok(out)
    }
}

impl Wire for Option<BaseValue> {
    fn write(&self, w: &mut WireWriter) -> Result<()> {
        write_base(self.as_ref(), w)
    }

    fn read(r: &mut WireReader<'_>) -> Result<Self> {
        read_base(r)
    }
}

impl Wire for Context {
    fn write(&self, w: &mut WireWriter) -> Result<()> {
        w.descend()?;
        w.write_count(self.basecount(), "basecount")?;
        write_base(self.base(), w)?;
        w.write_count(self.dim_count() as u64, "child count")?;
        for (dim, child) in self.children() {
            write_dimension(Some(dim), w)?;
            child.write(w)?;
        }
        w.ascend();
        Ok(())
    }

    fn read(r: &mut WireReader<'_>) -> Result<Self> {
        r.descend()?;
        let (count_at, basecount) = r.read_count("basecount")?;
        let mut out = match read_base(r)? {
            Some(value) => Context::from_base(value),
            None => Context::new(),
        };
        let (_, children) = r.read_count("child count")?;
        let mut last: Option<Dimension> = None;
        for _ in 0..children {
            let dim_at = r.offset;
            let dim = read_present_dimension(r)?;
            if last.as_ref().is_some_and(|prev| *prev >= dim) {
                return Err(r.error(dim_at, format!("dimension '{dim}' out of order")));
            }
            let child_at = r.offset;
            let child = Context::read(r)?;
            if child.is_empty() {
                return Err(r.error(child_at, format!("empty context under '{dim}'")));
            }
            out = out.with_dim(dim.clone(), child);
            last = Some(dim);
        }
        if out.basecount() != basecount {
            return Err(r.error(
                count_at,
                format!("declared basecount {basecount} but decoded {}", out.basecount()),
            ));
        }
        r.ascend();
        Ok(out)
    }
}

fn write_op(op: &ContextOp, w: &mut WireWriter) -> Result<()> {
    w.descend()?;
    let mut flags = 0;
    if op.clear_dims() {
        flags |= FLAG_CLEAR_DIMS;
    }
    if op.clear_base() {
        flags |= FLAG_CLEAR_BASE;
    }
    w.write_i32(flags);
    w.write_count(op.blankcount(), "blankcount")?;
    w.write_count(op.basecount(), "basecount")?;
    write_base(op.base(), w)?;
    w.write_count(op.dim_count() as u64, "child count")?;
    for (dim, child) in op.children() {
        write_dimension(Some(dim), w)?;
        write_op(child, w)?;
    }
    w.ascend();
    Ok(())
}

/// Decode one op node without normalizing it.
fn read_op(r: &mut WireReader<'_>) -> Result<ContextOp> {
    r.descend()?;
    let flags_at = r.offset;
    let flags = r.read_i32()?;
    if flags & !(FLAG_CLEAR_DIMS | FLAG_CLEAR_BASE) != 0 {
        return Err(r.error(flags_at, format!("unknown flag bits {flags:#x}")));
    }
    let (blank_at, blankcount) = r.read_count("blankcount")?;
    let (base_at, basecount) = r.read_count("basecount")?;
    let base = read_base(r)?;
    let (_, children) = r.read_count("child count")?;
    let mut dims = BTreeMap::new();
    for _ in 0..children {
        let dim_at = r.offset;
        let dim = read_present_dimension(r)?;
        let child = read_op(r)?;
        if dims.insert(dim.clone(), child).is_some() {
            return Err(r.error(dim_at, format!("duplicate dimension '{dim}'")));
        }
    }
    let op = ContextOp::from_parts(
        base,
        flags & FLAG_CLEAR_BASE != 0,
        flags & FLAG_CLEAR_DIMS != 0,
        dims,
    );
    if op.basecount() != basecount {
        return Err(r.error(base_at, format!("declared basecount {basecount} but decoded {}", op.basecount())));
    }
    if op.blankcount() != blankcount {
        return Err(r.error(blank_at, format!("declared blankcount {blankcount} but decoded {}", op.blankcount())));
    }
    r.ascend();
    Ok(op)
}

impl Wire for ContextOp {
    fn write(&self, w: &mut WireWriter) -> Result<()> {
        write_op(self, w)
    }

    fn read(r: &mut WireReader<'_>) -> Result<Self> {
        let mut op = read_op(r)?;
        op.normalize(false);
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    fn ctx(text: &str) -> Context {
        text.parse().unwrap()
    }

    fn op(text: &str) -> ContextOp {
        text.parse().unwrap()
    }

    fn deserialize_offset<T: std::fmt::Debug>(result: Result<T>) -> usize {
        match result {
            Err(IntenseError::Deserialize { offset, .. }) => offset,
            other => panic!("expected deserialize error, got {other:?}"),
        }
    }

    #[test]
    fn context_layout_is_big_endian() {
        let bytes = ctx("<a:<1>>").to_bytes().unwrap();
        insta::assert_snapshot!(
            hex::encode(&bytes),
            @"0000000100000000000000010000000100000000016100000001000000033ff000000000000000000000"
        );
    }

    #[test]
    fn op_layout_carries_flags_and_blankcount() {
        let bytes = op("[-]").to_bytes().unwrap();
        assert_eq!(
            bytes,
            [0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn values_survive_a_round_trip() {
        for text in [
            "<>",
            "<~+a:<^>>",
            "<\"caf\u{e9}\"+1:<-2.5>+\"two words\":<#00ff>>",
            "<x:<y:<z:<@0102>>>>",
        ] {
            let c = ctx(text);
            let back = Context::from_bytes(&c.to_bytes().unwrap()).unwrap();
            assert_eq!(back, c);
            assert_eq!(back.canonical(), c.canonical());
            crate::context::tests::audit(&back);
        }
        for text in ["[]", "[---]", "[--+b:[c:[]]]", "[--+5+a:<1+b:<2>>+c:[-]]"] {
            let o = op(text);
            let back = ContextOp::from_bytes(&o.to_bytes().unwrap()).unwrap();
            assert_eq!(back, o);
            assert_eq!(back.canonical(), o.canonical());
            crate::op::tests::audit(&back, false);
        }
    }

    #[test]
    fn quote_flag_survives() {
        let dim = Dimension::quoted("plain");
        let back = Dimension::from_bytes(&dim.to_bytes().unwrap()).unwrap();
        assert!(back.needs_quotes());
        assert_eq!(Option::<Dimension>::from_bytes(&[0, 0, 0, 0]).unwrap(), None);
    }

    #[test]
    fn compound_round_trip() {
        let path: CompoundDimension = "a:7:\"b c\"".parse().unwrap();
        let back = CompoundDimension::from_bytes(&path.to_bytes().unwrap()).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = ctx("<a:<\"hello\">>").to_bytes().unwrap();
        for cut in 0..bytes.len() {
            assert!(Context::from_bytes(&bytes[..cut]).is_err(), "accepted {cut} bytes");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = ctx("<1>").to_bytes().unwrap();
        let len = bytes.len();
        bytes.push(0);
        assert_eq!(deserialize_offset(Context::from_bytes(&bytes)), len);
    }

    #[test]
    fn hostile_lengths_fail_before_allocating() {
        // basecount 1, string tag, length i32::MAX
        let mut bytes = vec![0, 0, 0, 1, 0, 0, 0, 4];
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        assert_eq!(deserialize_offset(Context::from_bytes(&bytes)), 8);

        let mut negative = vec![0, 0, 0, 1, 0, 0, 0, 5];
        negative.extend_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(deserialize_offset(Context::from_bytes(&negative)), 8);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert_eq!(deserialize_offset(Context::from_bytes(&[0, 0, 0, 1, 0, 0, 0, 9])), 4);
        assert_eq!(deserialize_offset(Dimension::from_bytes(&[0, 0, 0, 3])), 0);
        assert_eq!(deserialize_offset(Dimension::from_bytes(&[0, 0, 0, 0])), 0);
    }

    #[test]
    fn declared_counts_must_match() {
        let mut bytes = ctx("<1>").to_bytes().unwrap();
        bytes[3] = 2;
        assert_eq!(deserialize_offset(Context::from_bytes(&bytes)), 0);

        let mut bytes = op("[-]").to_bytes().unwrap();
        bytes[7] = 2;
        assert_eq!(deserialize_offset(ContextOp::from_bytes(&bytes)), 4);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        // basecount 1, string tag, length 1, byte 0xff, no children
        let bytes = [0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 1, 0xff, 0, 0, 0, 0];
        assert_eq!(deserialize_offset(Context::from_bytes(&bytes)), 12);
    }

    #[test]
    fn limits_bound_depth_and_payloads() {
        let limits = Limits {
            max_depth: 2,
            max_payload_bytes: 4,
            ..Limits::default()
        };
        let deep = ctx("<a:<b:<1>>>");
        assert!(matches!(deep.to_bytes_with(&limits), Err(IntenseError::Structural(_))));
        let bytes = deep.to_bytes().unwrap();
        assert!(Context::from_bytes_with(&bytes, &limits, None).is_err());

        let long = ctx("<#0102030405>");
        assert!(long.to_bytes_with(&limits).is_err());
        let bytes = long.to_bytes().unwrap();
        assert_eq!(deserialize_offset(Context::from_bytes_with(&bytes, &limits, None)), 8);
    }

    #[test]
    fn bound_values_resolve_through_the_binder() {
        struct Upper;
        impl Binder for Upper {
            fn pack(&self, object: &(dyn Any + Send + Sync)) -> Option<Vec<u8>> {
                object.downcast_ref::<String>().map(|s| s.as_bytes().to_vec())
            }
            fn unpack(&self, bytes: &[u8]) -> Option<Arc<dyn Any + Send + Sync>> {
                Some(Arc::new(String::from_utf8_lossy(bytes).to_uppercase()))
            }
        }
        let bytes = ctx("<@6869>").to_bytes().unwrap();
        let raw = Context::from_bytes(&bytes).unwrap();
        match raw.base() {
            Some(BaseValue::Bound(b)) => assert!(!b.is_resolved()),
            other => panic!("expected bound value, got {other:?}"),
        }
        let resolved = Context::from_bytes_with(&bytes, &Limits::default(), Some(&Upper)).unwrap();
        match resolved.base() {
            Some(BaseValue::Bound(b)) => assert_eq!(b.downcast_ref::<String>().unwrap(), "HI"),
            other => panic!("expected bound value, got {other:?}"),
        }
    }
}
