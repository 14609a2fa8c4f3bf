//! The stable C-ABI surface: `CreateSolver`/`DeleteSolver`, `FitData32/64`,
//! `Predict32/64`, `GetBestModel`/`GetModel`/`FreeModel`, and the standalone
//! correlation entry points `Xicor32/64`/`Pearson32/64`.
//!
//! Every entry point returns `0` on success and `1` on precondition
//! failure; call [`symreg_last_error_message`] after a `1` for detail. A
//! panic crossing the boundary would be undefined behaviour, so every body
//! runs inside `catch_unwind`.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_double, c_float, c_int};
use std::ptr;

use symreg_core::error::SymRegError;

use crate::ffi_types::{CFitParams, CMathModel, CPredictParams, CSolverParams};
use crate::handle::SolverHandle;

const OK: c_int = 0;
const FAIL: c_int = 1;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(msg: impl Into<String>) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(msg.into()));
}

fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Retrieve the detail message for the most recent `1`-returning call on
/// this thread. Returns NULL if the last call on this thread succeeded.
/// The returned string must be released with [`symreg_free_string`].
#[no_mangle]
pub extern "C" fn symreg_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|cell| match cell.borrow().as_ref() {
        Some(msg) => CString::new(msg.as_str()).map(CString::into_raw).unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    })
}

/// Release a string returned by `symreg_last_error_message`.
///
/// # Safety
/// `ptr` must be a pointer previously returned by that function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn symreg_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe { drop(CString::from_raw(ptr)) };
    }
}

fn guard<F: FnOnce() -> Result<(), SymRegError> + std::panic::UnwindSafe>(f: F) -> c_int {
    match std::panic::catch_unwind(f) {
        Ok(Ok(())) => {
            clear_last_error();
            OK
        }
        Ok(Err(e)) => {
            set_last_error(e.to_string());
            FAIL
        }
        Err(_) => {
            set_last_error("internal panic caught at the FFI boundary");
            FAIL
        }
    }
}

/// Allocate a solver for the precision encoded in `*params`.
///
/// # Safety
/// `params` must point to a valid, initialized `CSolverParams`; `out_handle`
/// must point to writable storage for one pointer.
#[no_mangle]
pub unsafe extern "C" fn CreateSolver(
    params: *const CSolverParams,
    out_handle: *mut *mut SolverHandle,
) -> c_int {
    guard(move || {
        if params.is_null() || out_handle.is_null() {
            return Err(SymRegError::InvalidConfig("CreateSolver received a null pointer".into()));
        }
        let (config, precision) = unsafe { (*params).to_config() }?;
        let handle = Box::new(SolverHandle::new(config, precision));
        unsafe { *out_handle = Box::into_raw(handle) };
        Ok(())
    })
}

/// Release a handle returned by [`CreateSolver`].
///
/// # Safety
/// `handle` must be a pointer previously returned by `CreateSolver` and not
/// yet deleted, or NULL.
#[no_mangle]
pub unsafe extern "C" fn DeleteSolver(handle: *mut SolverHandle) -> c_int {
    guard(move || {
        if !handle.is_null() {
            unsafe { drop(Box::from_raw(handle)) };
        }
        Ok(())
    })
}

unsafe fn slice_f64_from_f32(ptr: *const c_float, len: usize) -> Vec<f64> {
    if ptr.is_null() {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(ptr, len) }.iter().map(|&v| v as f64).collect()
}

unsafe fn slice_f64(ptr: *const c_double, len: usize) -> Vec<f64> {
    if ptr.is_null() {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
}

macro_rules! fit_data_fn {
    ($name:ident, $elem:ty, $to_f64:expr) => {
        /// Fit every population against `(x, y[, sample_weight])`.
        ///
        /// # Safety
        /// `handle` must come from `CreateSolver`. `x` must be valid for
        /// `rows * cols` reads, `y` for `rows` reads, `sample_weight` either
        /// NULL or valid for `rows` reads. `fp` must point to a valid
        /// `CFitParams`; its string/array pointers follow the safety notes
        /// on [`CFitParams::to_fit_params`].
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: *mut SolverHandle,
            x: *const $elem,
            y: *const $elem,
            rows: u32,
            cols: u32,
            sample_weight: *const $elem,
            fp: *const CFitParams,
            out_score: *mut c_double,
        ) -> c_int {
            guard(move || {
                if handle.is_null() || x.is_null() || y.is_null() || fp.is_null() {
                    return Err(SymRegError::InvalidConfig(format!(
                        "{} received a null required pointer",
                        stringify!($name)
                    )));
                }
                let handle = unsafe { &mut *handle };
                let rows = rows as usize;
                let cols = cols as usize;
                let xf: Vec<f64> = $to_f64(x, rows * cols);
                let yf: Vec<f64> = $to_f64(y, rows);
                let wf: Vec<f64> = $to_f64(sample_weight, rows);
                let weight = if sample_weight.is_null() { None } else { Some(wf.as_slice()) };
                let fit_params = unsafe { (*fp).to_fit_params(cols as u32) }?;

                let score = match handle {
                    SolverHandle::F32(e) => e.fit(&xf, &yf, rows, cols, fit_params, weight)?,
                    SolverHandle::F64(e) => e.fit(&xf, &yf, rows, cols, fit_params, weight)?,
                };
                if !out_score.is_null() {
                    unsafe { *out_score = score };
                }
                Ok(())
            })
        }
    };
}

fit_data_fn!(FitData32, c_float, |p, n| unsafe { slice_f64_from_f32(p, n) });
fit_data_fn!(FitData64, c_double, |p, n| unsafe { slice_f64(p, n) });

macro_rules! predict_fn {
    ($name:ident, $elem:ty, $to_f64:expr, $from_f64:expr) => {
        /// Predict `rows` targets for `x` into `out_y`.
        ///
        /// # Safety
        /// `handle` must come from `CreateSolver` and have been fit at least
        /// once. `x` must be valid for `rows * cols` reads, `out_y` writable
        /// for `rows` writes. `pp` must point to a valid `CPredictParams`.
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            handle: *mut SolverHandle,
            x: *const $elem,
            rows: u32,
            cols: u32,
            pp: *const CPredictParams,
            out_y: *mut $elem,
        ) -> c_int {
            guard(move || {
                if handle.is_null() || x.is_null() || out_y.is_null() || pp.is_null() {
                    return Err(SymRegError::InvalidConfig(format!(
                        "{} received a null required pointer",
                        stringify!($name)
                    )));
                }
                let handle = unsafe { &mut *handle };
                let rows = rows as usize;
                let cols = cols as usize;
                let xf: Vec<f64> = $to_f64(x, rows * cols);
                let id = unsafe { (*pp).id };
                let id = if id == u64::MAX { None } else { Some(id) };

                let pred = match handle {
                    SolverHandle::F32(e) => e.predict(&xf, rows, cols, id)?,
                    SolverHandle::F64(e) => e.predict(&xf, rows, cols, id)?,
                };
                let out = unsafe { std::slice::from_raw_parts_mut(out_y, rows) };
                for (dst, v) in out.iter_mut().zip(pred.into_iter()) {
                    *dst = $from_f64(v);
                }
                Ok(())
            })
        }
    };
}

predict_fn!(Predict32, c_float, |p, n| unsafe { slice_f64_from_f32(p, n) }, |v: f64| v as f32);
predict_fn!(Predict64, c_double, |p, n| unsafe { slice_f64(p, n) }, |v: f64| v);

fn fill_model(out: &mut CMathModel, model: symreg_core::engine::MathModel) -> Result<(), SymRegError> {
    let repr = CString::new(model.expression)
        .map_err(|_| SymRegError::InvalidConfig("expression contained an interior NUL".into()))?;
    let code = CString::new(model.generated_code)
        .map_err(|_| SymRegError::InvalidConfig("generated code contained an interior NUL".into()))?;
    let mut consts = model.used_constants.into_boxed_slice();
    let consts_ptr = consts.as_mut_ptr();
    let consts_len = consts.len() as u32;
    std::mem::forget(consts);

    out.score = model.score;
    out.partial_score = model.partial_score;
    out.str_representation = repr.into_raw();
    out.str_code_representation = code.into_raw();
    out.used_constants = consts_ptr;
    out.used_constants_len = consts_len;
    Ok(())
}

/// Fetch the engine-wide best model into `*out_model`.
///
/// # Safety
/// `handle` must come from `CreateSolver` and have been fit at least once.
/// `out_model` must point to writable storage for one `CMathModel`.
#[no_mangle]
pub unsafe extern "C" fn GetBestModel(handle: *mut SolverHandle, out_model: *mut CMathModel) -> c_int {
    guard(move || {
        if handle.is_null() || out_model.is_null() {
            return Err(SymRegError::InvalidConfig("GetBestModel received a null pointer".into()));
        }
        let handle = unsafe { &*handle };
        let model = handle.get_best_model()?;
        let out = unsafe { &mut *out_model };
        out.id = 0;
        fill_model(out, model)
    })
}

/// Fetch the model identified by `id` (`thread_id * pop_size + within_id`)
/// into `*out_model`.
///
/// # Safety
/// Same as [`GetBestModel`].
#[no_mangle]
pub unsafe extern "C" fn GetModel(handle: *mut SolverHandle, id: u64, out_model: *mut CMathModel) -> c_int {
    guard(move || {
        if handle.is_null() || out_model.is_null() {
            return Err(SymRegError::InvalidConfig("GetModel received a null pointer".into()));
        }
        let handle = unsafe { &*handle };
        let model = handle.get_model_by_id(id)?;
        let out = unsafe { &mut *out_model };
        out.id = id;
        fill_model(out, model)
    })
}

/// Release the strings and constants array owned by a `CMathModel` filled
/// by [`GetBestModel`]/[`GetModel`]. Does not free `model` itself, which the
/// caller owns.
///
/// # Safety
/// `model` must point to a `CMathModel` previously filled by this crate, or
/// be a zeroed/default instance.
#[no_mangle]
pub unsafe extern "C" fn FreeModel(model: *mut CMathModel) -> c_int {
    guard(move || {
        if model.is_null() {
            return Ok(());
        }
        let m = unsafe { &mut *model };
        if !m.str_representation.is_null() {
            unsafe { drop(CString::from_raw(m.str_representation)) };
            m.str_representation = ptr::null_mut();
        }
        if !m.str_code_representation.is_null() {
            unsafe { drop(CString::from_raw(m.str_code_representation)) };
            m.str_code_representation = ptr::null_mut();
        }
        if !m.used_constants.is_null() {
            unsafe {
                drop(Box::from_raw(std::slice::from_raw_parts_mut(
                    m.used_constants,
                    m.used_constants_len as usize,
                )))
            };
            m.used_constants = ptr::null_mut();
            m.used_constants_len = 0;
        }
        Ok(())
    })
}

macro_rules! correlation_fn {
    ($name:ident, $elem:ty, $to_f64:expr, $f:path) => {
        /// # Safety
        /// `x` and `y` must both be valid for `n` reads; `out` must be
        /// writable for one `f64`.
        #[no_mangle]
        pub unsafe extern "C" fn $name(x: *const $elem, y: *const $elem, n: u32, out: *mut c_double) -> c_int {
            guard(move || {
                if x.is_null() || y.is_null() || out.is_null() {
                    return Err(SymRegError::InvalidConfig(format!(
                        "{} received a null pointer",
                        stringify!($name)
                    )));
                }
                let n = n as usize;
                let xf: Vec<f64> = $to_f64(x, n);
                let yf: Vec<f64> = $to_f64(y, n);
                let value = $f(&xf, &yf);
                unsafe { *out = value };
                Ok(())
            })
        }
    };
}

correlation_fn!(Xicor32, c_float, |p, n| unsafe { slice_f64_from_f32(p, n) }, symreg_core::correlation::xicor);
correlation_fn!(Xicor64, c_double, |p, n| unsafe { slice_f64(p, n) }, symreg_core::correlation::xicor);
correlation_fn!(Pearson32, c_float, |p, n| unsafe { slice_f64_from_f32(p, n) }, symreg_core::correlation::pearson);
correlation_fn!(Pearson64, c_double, |p, n| unsafe { slice_f64(p, n) }, symreg_core::correlation::pearson);
