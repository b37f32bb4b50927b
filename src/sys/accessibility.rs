use std::thread;
use std::time::{Duration, Instant};

use accessibility_sys::{AXIsProcessTrusted, AXIsProcessTrustedWithOptions, kAXTrustedCheckOptionPrompt};
use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

fn is_trusted() -> bool { unsafe { AXIsProcessTrusted() } as u8 != 0 }

fn prompt() {
    let key = unsafe { CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt) };
    let options = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) };
}

/// Prompts for accessibility permission if needed and waits for it to be
/// granted. Returns false if it still is not granted after the timeout.
pub fn ensure_permission() -> bool {
    if is_trusted() {
        return true;
    }

    info!("accessibility permission is not granted, prompting");
    prompt();

    let start = Instant::now();
    while start.elapsed() < POLL_TIMEOUT {
        if is_trusted() {
            info!("accessibility permission granted");
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    false
}
