//! Announce-button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch (BOOT key on the dev board) with the
//! internal pull-up enabled. The GPIO interrupt fires on both edges; the
//! ISR reads the level and forwards a key event to
//! [`ButtonDriver::on_key_event`], which signals the announce trigger on
//! a key-0 press.
//!
//! No debouncing: a bounce before the loop runs coalesces into the same
//! pending trigger bit, and a bounce after it just announces again.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::events::TriggerHandle;

/// Key code of the announce button.
pub const ANNOUNCE_KEY: u16 = 0;

/// Key value reported for a press (release is 0).
pub const KEY_PRESSED: i32 = 1;

/// Driver instance reachable from the GPIO ISR.
static INSTALLED: OnceLock<ButtonDriver> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonError {
    /// A driver is already wired to the interrupt.
    AlreadyInstalled,
    /// The GPIO ISR service or handler registration failed.
    IsrInstallFailed(i32),
}

impl core::fmt::Display for ButtonError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "button driver already installed"),
            Self::IsrInstallFailed(rc) => write!(f, "button ISR install failed (rc={})", rc),
        }
    }
}

#[derive(Debug)]
pub struct ButtonDriver {
    key: u16,
    trigger: TriggerHandle,
    presses: AtomicU32,
}

impl ButtonDriver {
    pub fn new(key: u16, trigger: TriggerHandle) -> Self {
        Self {
            key,
            trigger,
            presses: AtomicU32::new(0),
        }
    }

    /// Handle one key event. Safe from interrupt context: a matching press
    /// only sets the trigger's pending bit. Returns whether it matched.
    pub fn on_key_event(&self, key: u16, value: i32) -> bool {
        if key != self.key || value != KEY_PRESSED {
            return false;
        }
        self.presses.fetch_add(1, Ordering::Relaxed);
        self.trigger.signal_from_isr();
        true
    }

    /// Presses seen since construction.
    pub fn presses(&self) -> u32 {
        self.presses.load(Ordering::Relaxed)
    }

    /// Wire the driver to the button GPIO interrupt.
    #[cfg(target_os = "espidf")]
    pub fn install(self, gpio: i32) -> Result<&'static ButtonDriver, ButtonError> {
        use esp_idf_svc::sys::*;

        INSTALLED.set(self).map_err(|_| ButtonError::AlreadyInstalled)?;

        // SAFETY: called once from main before the loop starts. The handler
        // only reads a register and touches atomics.
        unsafe {
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << gpio,
                mode: gpio_mode_t_GPIO_MODE_INPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
                ..Default::default()
            };
            let ret = gpio_config(&cfg);
            if ret != ESP_OK as i32 {
                return Err(ButtonError::IsrInstallFailed(ret));
            }
            let ret = gpio_install_isr_service(0);
            if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
                return Err(ButtonError::IsrInstallFailed(ret));
            }
            let ret = gpio_isr_handler_add(gpio, Some(button_gpio_isr), gpio as usize as *mut core::ffi::c_void);
            if ret != ESP_OK as i32 {
                return Err(ButtonError::IsrInstallFailed(ret));
            }
            gpio_intr_enable(gpio);
        }
        log::info!("Button: key {} on GPIO{} armed", ANNOUNCE_KEY, gpio);
        INSTALLED.get().ok_or(ButtonError::AlreadyInstalled)
    }

    /// Simulation: no interrupt; key events are fed by the caller.
    #[cfg(not(target_os = "espidf"))]
    pub fn install(self, gpio: i32) -> Result<&'static ButtonDriver, ButtonError> {
        INSTALLED.set(self).map_err(|_| ButtonError::AlreadyInstalled)?;
        log::info!("Button(sim): GPIO{} ISR skipped", gpio);
        INSTALLED.get().ok_or(ButtonError::AlreadyInstalled)
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(arg: *mut core::ffi::c_void) {
    let gpio = arg as usize as i32;
    // SAFETY: gpio_get_level is a register read; safe in ISR context.
    let pressed = unsafe { esp_idf_svc::sys::gpio_get_level(gpio) } == 0;
    if let Some(driver) = INSTALLED.get() {
        driver.on_key_event(ANNOUNCE_KEY, i32::from(pressed));
    }
}
