//! Cross-chunk prev-state carried by a single codec pipeline instance
//! (the prev-state contract). A fresh [`PrevState::None`] lazily
//! initializes itself to the zero state the first codec call asks for, the
//! same zero-initialization `data_compressor.cpp`'s per-instance workspace
//! map performs on first use of a new `(shape, level)` key.

use crate::error::CodecError;

#[derive(Debug, Clone)]
pub enum PrevState {
    None,
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    U16Column(Vec<u16>),
    U32Column(Vec<u32>),
    U64Column(Vec<u64>),
    U16Snapshot(Vec<u16>),
    U32Snapshot(Vec<u32>),
}

fn mismatch(expected: &str, state: &PrevState) -> CodecError {
    CodecError::Internal(format!("expected {expected} prev-state, found {state:?}"))
}

impl PrevState {
    pub fn as_u16_mut(&mut self) -> Result<&mut u16, CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U16(0);
        }
        match self {
            PrevState::U16(v) => Ok(v),
            other => Err(mismatch("U16", other)),
        }
    }

    pub fn as_u32_mut(&mut self) -> Result<&mut u32, CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U32(0);
        }
        match self {
            PrevState::U32(v) => Ok(v),
            other => Err(mismatch("U32", other)),
        }
    }

    pub fn as_u64_mut(&mut self) -> Result<&mut u64, CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U64(0);
        }
        match self {
            PrevState::U64(v) => Ok(v),
            other => Err(mismatch("U64", other)),
        }
    }

    pub fn as_i64_mut(&mut self) -> Result<&mut i64, CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::I64(0);
        }
        match self {
            PrevState::I64(v) => Ok(v),
            other => Err(mismatch("I64", other)),
        }
    }

    pub fn as_u16_column_mut(&mut self, cols: usize) -> Result<&mut [u16], CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U16Column(vec![0; cols]);
        }
        match self {
            PrevState::U16Column(v) => {
                if v.len() != cols {
                    return Err(CodecError::InvalidState { expected: cols, got: v.len() });
                }
                Ok(v.as_mut_slice())
            }
            other => Err(mismatch("U16Column", other)),
        }
    }

    pub fn as_u32_column_mut(&mut self, cols: usize) -> Result<&mut [u32], CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U32Column(vec![0; cols]);
        }
        match self {
            PrevState::U32Column(v) => {
                if v.len() != cols {
                    return Err(CodecError::InvalidState { expected: cols, got: v.len() });
                }
                Ok(v.as_mut_slice())
            }
            other => Err(mismatch("U32Column", other)),
        }
    }

    pub fn as_u64_column_mut(&mut self, cols: usize) -> Result<&mut [u64], CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U64Column(vec![0; cols]);
        }
        match self {
            PrevState::U64Column(v) => {
                if v.len() != cols {
                    return Err(CodecError::InvalidState { expected: cols, got: v.len() });
                }
                Ok(v.as_mut_slice())
            }
            other => Err(mismatch("U64Column", other)),
        }
    }

    pub fn as_u16_snapshot_mut(&mut self, elems: usize) -> Result<&mut [u16], CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U16Snapshot(vec![0; elems]);
        }
        match self {
            PrevState::U16Snapshot(v) => {
                if v.len() != elems {
                    return Err(CodecError::InvalidState { expected: elems, got: v.len() });
                }
                Ok(v.as_mut_slice())
            }
            other => Err(mismatch("U16Snapshot", other)),
        }
    }

    pub fn as_u32_snapshot_mut(&mut self, elems: usize) -> Result<&mut [u32], CodecError> {
        if matches!(self, PrevState::None) {
            *self = PrevState::U32Snapshot(vec![0; elems]);
        }
        match self {
            PrevState::U32Snapshot(v) => {
                if v.len() != elems {
                    return Err(CodecError::InvalidState { expected: elems, got: v.len() });
                }
                Ok(v.as_mut_slice())
            }
            other => Err(mismatch("U32Snapshot", other)),
        }
    }
}
