//! Low-level glue around the native netcdf library.
//!
//! libnetcdf needs a real file path, so in-memory sources are staged into a
//! temporary file first. On Linux the staging directory is `/dev/shm` when it
//! is writable, which keeps the round trip off disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use tracing::debug;

use crate::dataset::AttrValue;
use crate::error::NetCdfResult;

/// Silence HDF5's automatic error printing to stderr.
///
/// HDF5 reports every failed lookup (for example an optional attribute that
/// is absent) on stderr even though the caller handles it. Call this before
/// the first netcdf operation; repeated calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 accepts null handlers to disable printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// A staged copy of an in-memory netCDF file, removed on drop.
pub(crate) struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub(crate) fn write(bytes: &[u8]) -> NetCdfResult<Self> {
        let path = optimal_temp_dir().join(temp_filename());
        let mut file = std::fs::File::create(&path)?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!(path = %path.display(), size = bytes.len(), "Staged netCDF bytes");
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Memory-backed `/dev/shm` on Linux when writable, else the system temp dir.
fn optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm_path = Path::new("/dev/shm");
        if shm_path.is_dir() {
            let probe = shm_path.join(format!(".ghg_cog_probe_{}", std::process::id()));
            if std::fs::write(&probe, b"probe").is_ok() {
                let _ = std::fs::remove_file(&probe);
                return shm_path.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

/// Unique per process, thread and call.
fn temp_filename() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let tid = std::thread::current().id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("ghg_cog_{}_{:?}_{}.nc", pid, tid, count)
}

// =============================================================================
// Attribute helpers
// =============================================================================

/// Check for an attribute without triggering an HDF5 lookup failure.
pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

pub(crate) fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    convert_attr(value).and_then(|v| v.as_f64())
}

/// Map a library attribute value onto the crate's owned representation.
pub(crate) fn convert_attr(value: netcdf::AttributeValue) -> Option<AttrValue> {
    use netcdf::AttributeValue as A;

    fn many<T: Into<f64> + Copy>(v: &[T]) -> AttrValue {
        match v {
            [single] => AttrValue::Number((*single).into()),
            _ => AttrValue::Numbers(v.iter().map(|&x| x.into()).collect()),
        }
    }

    let converted = match value {
        A::Str(s) => AttrValue::Text(s),
        A::Strs(s) => AttrValue::Text(s.join(", ")),
        A::Double(v) => AttrValue::Number(v),
        A::Doubles(v) => many(&v),
        A::Float(v) => AttrValue::Number(v as f64),
        A::Floats(v) => many(&v),
        A::Int(v) => AttrValue::Number(v as f64),
        A::Ints(v) => many(&v),
        A::Uint(v) => AttrValue::Number(v as f64),
        A::Uints(v) => many(&v),
        A::Short(v) => AttrValue::Number(v as f64),
        A::Shorts(v) => many(&v),
        A::Ushort(v) => AttrValue::Number(v as f64),
        A::Ushorts(v) => many(&v),
        A::Schar(v) => AttrValue::Number(v as f64),
        A::Schars(v) => many(&v),
        A::Uchar(v) => AttrValue::Number(v as f64),
        A::Uchars(v) => many(&v),
        A::Longlong(v) => AttrValue::Number(v as f64),
        A::Longlongs(v) => AttrValue::Numbers(v.iter().map(|&x| x as f64).collect()),
        A::Ulonglong(v) => AttrValue::Number(v as f64),
        A::Ulonglongs(v) => AttrValue::Numbers(v.iter().map(|&x| x as f64).collect()),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(converted)
}
