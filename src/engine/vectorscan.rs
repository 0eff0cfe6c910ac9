//! Vectorscan (Hyperscan) backend
//!
//! # Invariants and safety
//! - The block-mode database is immutable once compiled.
//! - Each engine owns its own `hs_scratch_t`; `scan` takes `&mut self`, so a
//!   scratch region is never used by two scans at once.
//! - The match callback never panics or unwinds across the FFI boundary.
//! - The callback context pointer is only valid for the duration of one
//!   `hs_scan` call.
//! - `hs_scan` takes a `u32` length; longer buffers are scanned in
//!   consecutive windows, so a match straddling a window edge is missed.

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::ptr;

use libc::{c_char, c_int, c_uint, c_void};
use vectorscan_rs_sys as vs;

use super::{EngineKind, Exclusion, MatchEngine, PrepareReport};
use crate::compiler::PatternSet;
use crate::error::{Result, ScanError};
use crate::stats::ScanStats;

struct VsDatabase {
    db: *mut vs::hs_database_t,
}

// The compiled database is read-only after hs_compile_multi.
unsafe impl Send for VsDatabase {}
unsafe impl Sync for VsDatabase {}

impl Drop for VsDatabase {
    fn drop(&mut self) {
        if !self.db.is_null() {
            unsafe {
                vs::hs_free_database(self.db);
            }
        }
    }
}

/// Per-engine scratch. Movable to another thread, never shared.
struct VsScratch {
    scratch: *mut vs::hs_scratch_t,
}

unsafe impl Send for VsScratch {}

impl Drop for VsScratch {
    fn drop(&mut self) {
        if !self.scratch.is_null() {
            unsafe {
                vs::hs_free_scratch(self.scratch);
            }
        }
    }
}

struct CompileFailure {
    /// Index of the offending expression, if the library named one
    expression: Option<usize>,
    message: String,
}

fn compile_block_db(
    expressions: &[CString],
    flags: &[c_uint],
) -> std::result::Result<VsDatabase, CompileFailure> {
    let expr_ptrs: Vec<*const c_char> = expressions.iter().map(|e| e.as_ptr()).collect();
    let ids: Vec<c_uint> = (0..expressions.len() as c_uint).collect();

    let mut platform = MaybeUninit::<vs::hs_platform_info_t>::zeroed();
    unsafe {
        let _ = vs::hs_populate_platform(platform.as_mut_ptr());
    }
    let platform = unsafe { platform.assume_init() };

    let mut db: *mut vs::hs_database_t = ptr::null_mut();
    let mut compile_err: *mut vs::hs_compile_error_t = ptr::null_mut();

    let rc = unsafe {
        vs::hs_compile_multi(
            expr_ptrs.as_ptr(),
            flags.as_ptr(),
            ids.as_ptr(),
            expr_ptrs.len() as c_uint,
            vs::HS_MODE_BLOCK as c_uint,
            &platform as *const vs::hs_platform_info_t,
            &mut db as *mut *mut vs::hs_database_t,
            &mut compile_err as *mut *mut vs::hs_compile_error_t,
        )
    };

    if rc == vs::HS_SUCCESS as c_int {
        return Ok(VsDatabase { db });
    }

    let failure = unsafe {
        if compile_err.is_null() {
            CompileFailure {
                expression: None,
                message: format!("hs_compile_multi failed: rc={rc}"),
            }
        } else {
            let message = if (*compile_err).message.is_null() {
                "hs_compile_multi failed (null error message)".to_string()
            } else {
                std::ffi::CStr::from_ptr((*compile_err).message)
                    .to_string_lossy()
                    .into_owned()
            };
            let expression = usize::try_from((*compile_err).expression).ok();
            vs::hs_free_compile_error(compile_err);
            CompileFailure { expression, message }
        }
    };
    Err(failure)
}

impl VsDatabase {
    fn alloc_scratch(&self) -> std::result::Result<VsScratch, String> {
        let mut scratch: *mut vs::hs_scratch_t = ptr::null_mut();
        let rc = unsafe { vs::hs_alloc_scratch(self.db, &mut scratch as *mut *mut vs::hs_scratch_t) };
        if rc != vs::HS_SUCCESS as c_int {
            return Err(format!("hs_alloc_scratch failed: rc={rc}"));
        }
        Ok(VsScratch { scratch })
    }
}

struct MatchCtx {
    hits: *mut bool,
    len: usize,
}

/// Marks the pattern id as seen and keeps scanning.
///
/// # Safety
/// - `ctx` must point to a valid `MatchCtx` whose `hits` covers `len` flags.
unsafe extern "C" fn on_match(
    id: c_uint,
    _from: u64,
    _to: u64,
    _flags: c_uint,
    ctx: *mut c_void,
) -> c_int {
    if ctx.is_null() {
        return 0;
    }
    let ctx = unsafe { &*(ctx as *const MatchCtx) };
    let id = id as usize;
    if id < ctx.len {
        unsafe {
            *ctx.hits.add(id) = true;
        }
    }
    0
}

struct Active {
    name: String,
    min_file_size: u64,
}

/// Whole signature set in a single Vectorscan database.
#[derive(Default)]
pub struct VectorscanEngine {
    // scratch must drop before the database it was sized for
    scratch: Option<VsScratch>,
    db: Option<VsDatabase>,
    active: Vec<Active>,
    hits: Vec<bool>,
}

impl VectorscanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan_window(&mut self, window: &[u8]) {
        let (Some(db), Some(scratch)) = (&self.db, &self.scratch) else {
            return;
        };
        // window length is bounded by u32::MAX in scan()
        let len = window.len() as c_uint;
        let mut ctx = MatchCtx {
            hits: self.hits.as_mut_ptr(),
            len: self.hits.len(),
        };
        let rc = unsafe {
            vs::hs_scan(
                db.db,
                window.as_ptr().cast::<c_char>(),
                len,
                0,
                scratch.scratch,
                Some(on_match),
                (&mut ctx as *mut MatchCtx).cast::<c_void>(),
            )
        };
        if rc != vs::HS_SUCCESS as c_int && rc != vs::HS_SCAN_TERMINATED as c_int {
            tracing::debug!(rc, "hs_scan failed");
        }
    }
}

impl MatchEngine for VectorscanEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Vectorscan
    }

    fn prepare(&mut self, patterns: &PatternSet) -> Result<PrepareReport> {
        let mut report = PrepareReport::default();
        self.scratch = None;
        self.db = None;
        self.active.clear();

        let mut expressions = Vec::new();
        let mut flags = Vec::new();
        for pattern in patterns.patterns() {
            let Ok(expression) = CString::new(pattern.expression.as_str()) else {
                report.excluded.push(Exclusion {
                    name: pattern.name.clone(),
                    reason: "expression contains a NUL byte".to_string(),
                });
                continue;
            };
            let mut f = vs::HS_FLAG_DOTALL | vs::HS_FLAG_SINGLEMATCH;
            if pattern.caseless {
                f |= vs::HS_FLAG_CASELESS;
            }
            expressions.push(expression);
            flags.push(f as c_uint);
            self.active.push(Active {
                name: pattern.name.clone(),
                min_file_size: pattern.min_file_size,
            });
        }

        // Drop whichever expression the compiler rejects and retry with the rest.
        let db = loop {
            if expressions.is_empty() {
                break None;
            }
            match compile_block_db(&expressions, &flags) {
                Ok(db) => break Some(db),
                Err(CompileFailure {
                    expression: Some(index),
                    message,
                }) if index < expressions.len() => {
                    expressions.remove(index);
                    flags.remove(index);
                    let rejected = self.active.remove(index);
                    report.excluded.push(Exclusion {
                        name: rejected.name,
                        reason: message,
                    });
                }
                Err(CompileFailure { message, .. }) => {
                    self.active.clear();
                    return Err(ScanError::PatternCompile {
                        engine: EngineKind::Vectorscan,
                        reason: message,
                    });
                }
            }
        };

        if let Some(db) = db {
            let scratch = db.alloc_scratch().map_err(|reason| ScanError::PatternCompile {
                engine: EngineKind::Vectorscan,
                reason,
            })?;
            self.scratch = Some(scratch);
            self.db = Some(db);
        }

        self.hits = vec![false; self.active.len()];
        report.active = self.active.len();
        Ok(report)
    }

    fn scan(&mut self, buffer: &[u8], stats: &mut ScanStats) {
        if buffer.is_empty() || self.db.is_none() {
            return;
        }
        self.hits.iter_mut().for_each(|h| *h = false);

        for window in buffer.chunks(u32::MAX as usize) {
            self.scan_window(window);
        }

        for (hit, active) in self.hits.iter().zip(&self.active) {
            if *hit && buffer.len() as u64 >= active.min_file_size {
                stats.record(&active.name);
            }
        }
    }

    fn active_patterns(&self) -> usize {
        self.active.len()
    }
}
