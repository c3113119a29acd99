use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Code that hosts exported services.
///
/// Dropping the module unloads it.
pub trait Module: Send + Sync + 'static {
    fn name(&self) -> &str;
}

struct Builtin {
    name: String,
}

impl Module for Builtin {
    fn name(&self) -> &str {
        &self.name
    }
}

struct Loaded {
    module: Box<dyn Module>,
}

impl Drop for Loaded {
    fn drop(&mut self) {
        tracing::debug!(library = self.module.name(), "unloading library");
    }
}

/// Shared handle to a loaded module.
///
/// Clones share the module; it is unloaded when the last clone is dropped.
#[derive(Clone)]
pub struct Library {
    inner: Arc<Loaded>,
}

impl Library {
    /// A library for services linked into the running binary.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::from_module(Builtin { name: name.into() })
    }

    /// Load a shared object through the OS loader.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let module = platform::DynamicModule::open(path.as_ref())?;
        tracing::debug!(library = module.name(), "loaded library");
        Ok(Self::from_module(module))
    }

    pub fn from_module(module: impl Module) -> Self {
        Self {
            inner: Arc::new(Loaded {
                module: Box::new(module),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.module.name()
    }

    /// Number of live handles to this library.
    pub fn references(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Give up this handle. Returns true if it was the last one and the
    /// module has been unloaded.
    pub fn unload(self) -> bool {
        Arc::into_inner(self.inner).is_some()
    }
}

impl PartialEq for Library {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Library {}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name())
            .field("references", &self.references())
            .finish()
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::{CStr, CString};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    use super::Module;
    use crate::error::{CoreError, Result};

    pub(super) struct DynamicModule {
        name: String,
        handle: *mut libc::c_void,
    }

    // SAFETY: the handle is an opaque token owned by this struct; the loader
    // API is thread-safe and the handle is only passed back to `dlclose`.
    unsafe impl Send for DynamicModule {}
    // SAFETY: shared access never touches the handle.
    unsafe impl Sync for DynamicModule {}

    impl DynamicModule {
        pub(super) fn open(path: &Path) -> Result<Self> {
            let raw = CString::new(path.as_os_str().as_bytes())
                .map_err(|_| CoreError::InvalidPath(path.to_path_buf()))?;

            // SAFETY: `raw` is a valid NUL-terminated string that outlives the call.
            let handle = unsafe { libc::dlopen(raw.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
            if handle.is_null() {
                return Err(CoreError::LoadFailed {
                    path: path.to_path_buf(),
                    message: last_error(),
                });
            }

            Ok(Self {
                name: path.display().to_string(),
                handle,
            })
        }
    }

    fn last_error() -> String {
        // SAFETY: `dlerror` returns either null or a NUL-terminated string that
        // stays valid until the next loader call on this thread.
        let message = unsafe { libc::dlerror() };
        if message.is_null() {
            return "unknown loader error".to_string();
        }
        // SAFETY: checked non-null above.
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }

    impl Module for DynamicModule {
        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Drop for DynamicModule {
        fn drop(&mut self) {
            // SAFETY: `handle` came from a successful `dlopen` and is closed once.
            let rc = unsafe { libc::dlclose(self.handle) };
            if rc != 0 {
                tracing::warn!(library = %self.name, error = %last_error(), "dlclose failed");
            }
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use windows_sys::Win32::Foundation::{FreeLibrary, GetLastError, HMODULE};
    use windows_sys::Win32::System::LibraryLoader::LoadLibraryW;

    use super::Module;
    use crate::error::{CoreError, Result};

    pub(super) struct DynamicModule {
        name: String,
        handle: HMODULE,
    }

    // SAFETY: the module handle is an opaque token owned by this struct and is
    // only passed back to `FreeLibrary`.
    unsafe impl Send for DynamicModule {}
    // SAFETY: shared access never touches the handle.
    unsafe impl Sync for DynamicModule {}

    impl DynamicModule {
        pub(super) fn open(path: &Path) -> Result<Self> {
            let wide: Vec<u16> = path
                .as_os_str()
                .encode_wide()
                .chain(std::iter::once(0))
                .collect();
            if wide[..wide.len() - 1].contains(&0) {
                return Err(CoreError::InvalidPath(path.to_path_buf()));
            }

            // SAFETY: `wide` is a valid NUL-terminated UTF-16 string that
            // outlives the call.
            let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
            if handle.is_null() {
                // SAFETY: no preconditions.
                let code = unsafe { GetLastError() };
                return Err(CoreError::LoadFailed {
                    path: path.to_path_buf(),
                    message: format!("LoadLibraryW failed with error {code}"),
                });
            }

            Ok(Self {
                name: path.display().to_string(),
                handle,
            })
        }
    }

    impl Module for DynamicModule {
        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Drop for DynamicModule {
        fn drop(&mut self) {
            // SAFETY: `handle` came from a successful `LoadLibraryW` and is
            // freed once.
            if unsafe { FreeLibrary(self.handle) } == 0 {
                tracing::warn!(library = %self.name, "FreeLibrary failed");
            }
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use std::path::Path;

    use super::Module;
    use crate::error::{CoreError, Result};

    pub(super) struct DynamicModule {
        name: String,
    }

    impl DynamicModule {
        pub(super) fn open(_path: &Path) -> Result<Self> {
            Err(CoreError::Unsupported)
        }
    }

    impl Module for DynamicModule {
        fn name(&self) -> &str {
            &self.name
        }
    }
}
