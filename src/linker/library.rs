//! Dynamic library loading and symbol resolution
//!
//! Platform-agnostic wrapper around dlopen/LoadLibrary.

use super::{FunctionAddress, LinkError, SymbolLookup};
use core::ffi::c_void;
use core::ptr::NonNull;
use std::ffi::CString;

/// Handle to a dynamically loaded library
pub struct NativeLibrary {
    handle: NonNull<c_void>,
    /// Release the handle on drop; false for the running process on Windows
    owned: bool,
}

impl NativeLibrary {
    /// Load library by name, searching the standard library paths
    pub fn load(name: &str) -> Result<Self, LinkError> {
        let cname = CString::new(name).map_err(|_| LinkError::InvalidName)?;
        Self::open(Some(&cname))
    }

    /// Symbols of the running executable and everything it has loaded
    pub fn this_process() -> Result<Self, LinkError> {
        Self::open(None)
    }

    #[cfg(unix)]
    fn open(name: Option<&CString>) -> Result<Self, LinkError> {
        let filename = name.map_or(core::ptr::null(), |n| n.as_ptr());
        unsafe {
            let handle = libc::dlopen(filename, libc::RTLD_NOW);
            NonNull::new(handle)
                .map(|handle| Self { handle, owned: true })
                .ok_or_else(|| LinkError::LoadFailed(last_dl_error()))
        }
    }

    #[cfg(windows)]
    fn open(name: Option<&CString>) -> Result<Self, LinkError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::errhandlingapi::GetLastError;
        use winapi::um::libloaderapi::{GetModuleHandleW, LoadLibraryW};

        unsafe {
            let (handle, owned) = match name {
                Some(name) => {
                    let wide: Vec<u16> = OsStr::new(&*name.to_string_lossy())
                        .encode_wide()
                        .chain(Some(0))
                        .collect();
                    (LoadLibraryW(wide.as_ptr()), true)
                }
                None => (GetModuleHandleW(core::ptr::null()), false),
            };
            NonNull::new(handle as *mut c_void)
                .map(|handle| Self { handle, owned })
                .ok_or_else(|| LinkError::LoadFailed(format!("Error code: {}", GetLastError())))
        }
    }

    /// Get function address by symbol name
    pub fn symbol(&self, name: &str) -> Result<FunctionAddress, LinkError> {
        let cname = CString::new(name).map_err(|_| LinkError::InvalidName)?;
        let ptr = self.symbol_impl(&cname);
        if ptr.is_null() {
            Err(LinkError::NotFound {
                name: name.to_string(),
            })
        } else {
            Ok(FunctionAddress(ptr as usize))
        }
    }

    #[cfg(unix)]
    fn symbol_impl(&self, name: &CString) -> *mut c_void {
        unsafe { libc::dlsym(self.handle.as_ptr(), name.as_ptr()) }
    }

    #[cfg(windows)]
    fn symbol_impl(&self, name: &CString) -> *mut c_void {
        use winapi::shared::minwindef::HMODULE;
        use winapi::um::libloaderapi::GetProcAddress;
        unsafe { GetProcAddress(self.handle.as_ptr() as HMODULE, name.as_ptr()) as *mut c_void }
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "Unknown error".into()
        } else {
            std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

impl SymbolLookup for NativeLibrary {
    fn lookup(&self, name: &str) -> Result<FunctionAddress, LinkError> {
        self.symbol(name)
    }
}

impl Drop for NativeLibrary {
    #[cfg(unix)]
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                libc::dlclose(self.handle.as_ptr());
            }
        }
    }

    #[cfg(windows)]
    fn drop(&mut self) {
        use winapi::shared::minwindef::HMODULE;
        use winapi::um::libloaderapi::FreeLibrary;
        if self.owned {
            unsafe {
                FreeLibrary(self.handle.as_ptr() as HMODULE);
            }
        }
    }
}

// Library handles are process-global and usable from any thread
unsafe impl Send for NativeLibrary {}
unsafe impl Sync for NativeLibrary {}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("handle", &self.handle)
            .finish()
    }
}
