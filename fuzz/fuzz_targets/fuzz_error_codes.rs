//! HRESULT decomposition and error classification for arbitrary codes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use windows::core::HRESULT;
use windows::Win32::Foundation::WIN32_ERROR;
use winterop::error::{error_for_hresult, error_for_win32, hresult_from_win32, HResultParts, FACILITY_WIN32};

fuzz_target!(|code: u32| {
    let hr = HRESULT(code as i32);
    assert_eq!(hr.failed(), !hr.succeeded());
    assert_eq!(hr.severity() == 1, hr.failed());

    // Rebuilding from the fields gives the original value back.
    let rebuilt = (hr.severity() << 31) | (hr.facility() << 16) | hr.code() as u32;
    assert_eq!(rebuilt & !0x6000_0000, code & !0x6000_0000);

    let wrapped = hresult_from_win32(code & 0xFFFF);
    if code & 0xFFFF != 0 {
        assert!(wrapped.failed());
        assert_eq!(wrapped.facility(), FACILITY_WIN32);
        assert_eq!(wrapped.code() as u32, code & 0xFFFF);

        // A wrapped Win32 code classifies the same way as the bare code.
        let direct = error_for_win32(WIN32_ERROR(code & 0xFFFF), None);
        let via_hresult = error_for_hresult(wrapped, None);
        assert_eq!(
            std::mem::discriminant(&direct),
            std::mem::discriminant(&via_hresult)
        );
        assert_eq!(direct.win32_error_code(), via_hresult.win32_error_code());
    }

    let _ = error_for_hresult(hr, Some("fuzz"));
});
