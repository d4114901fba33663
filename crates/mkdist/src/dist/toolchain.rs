//! Compiler selection per target platform.

use serde::Serialize;

use super::config::TargetPlatform;

/// Fortran and C compilers handed to pymake, plus the executable suffix
/// they produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Toolchain {
    pub fc: &'static str,
    pub cc: &'static str,
    pub exe_suffix: &'static str,
}

impl Toolchain {
    /// gfortran/gcc. Distributed makefiles are always generated with this pair.
    pub const GNU: Self = Self {
        fc: "gfortran",
        cc: "gcc",
        exe_suffix: "",
    };

    /// Intel Fortran with the MSVC C compiler.
    pub const INTEL_MSVC: Self = Self {
        fc: "ifort",
        cc: "cl",
        exe_suffix: ".exe",
    };

    pub fn for_platform(platform: TargetPlatform) -> Self {
        match platform {
            TargetPlatform::CrossTarget => Self::INTEL_MSVC,
            TargetPlatform::Native => Self::GNU,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_uses_intel() {
        let tc = Toolchain::for_platform(TargetPlatform::CrossTarget);
        assert_eq!((tc.fc, tc.cc, tc.exe_suffix), ("ifort", "cl", ".exe"));
    }

    #[test]
    fn test_native_uses_gnu() {
        let tc = Toolchain::for_platform(TargetPlatform::Native);
        assert_eq!((tc.fc, tc.cc, tc.exe_suffix), ("gfortran", "gcc", ""));
    }
}
