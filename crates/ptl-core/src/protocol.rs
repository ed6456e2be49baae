//! # Light Module Protocol
//!
//! Pure encoder from logical light intents to the text commands the
//! controller forwards to its modules.
//!
//! ## Command Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pick Sequence Command                              │
//! │                                                                         │
//! │   PP505  00  00  m1 CCB DC1  [m2 CCB DC2]  AAAA DDDDD  AAAA DDDDD ...   │
//! │   ─────  ──  ──  ──────────  ───────────   ──────────────────────────   │
//! │   prefix fn  sub  initial     after-confirm  one entry per module       │
//! │                   mode block  mode block     (4-digit address +         │
//! │                               (optional)      5-char display)           │
//! │                                                                         │
//! │   CC = color/blink code, B = buzzer digit                              │
//! │                                                                         │
//! │                      Off Command                                        │
//! │                                                                         │
//! │   D  AAAA ␣␣␣␣␣  AAAA ␣␣␣␣␣ ...                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is deterministic: identical inputs always produce an
//! identical string.

use crate::error::{CoreError, CoreResult};
use crate::types::{LightColor, LightIntent, LightState, ModuleAddress};

// =============================================================================
// Wire Constants
// =============================================================================

/// Pick sequence command prefix.
pub const COMMAND_PREFIX: &str = "PP505";

/// Function code: FN data after key.
pub const FUNCTION_CODE: &str = "00";

/// Subfunction code: signal light control.
pub const SUBFUNCTION_CODE: &str = "00";

/// Marker of the initial mode block.
pub const INITIAL_MODE_MARKER: &str = "m1";

/// Marker of the after-confirmation mode block.
pub const CONFIRM_MODE_MARKER: &str = "m2";

/// DC1, closes the initial mode block.
pub const INITIAL_MODE_TERMINATOR: char = '\u{11}';

/// DC2, closes the after-confirmation mode block.
pub const CONFIRM_MODE_TERMINATOR: char = '\u{12}';

/// Prefix of the turn-off command.
pub const OFF_COMMAND_PREFIX: &str = "D";

/// Width of the module address field.
pub const ADDRESS_WIDTH: usize = 4;

/// Width of the module display field.
pub const DISPLAY_WIDTH: usize = 5;

/// Text shown on a module pressed by mistake.
pub const ERROR_DISPLAY: &str = "ERR";

// =============================================================================
// Mode Codes
// =============================================================================

/// Maps a light state to its three-character mode code.
///
/// ```text
/// color  blinking  code     + buzzer digit
/// off    false     00         0 / 1
/// red    false     10
/// red    true      11
/// green  false     20
/// green  true      21
/// ```
///
/// An "off" module can neither blink nor sound the buzzer.
pub fn mode_code(state: &LightState) -> CoreResult<String> {
    let code = match (state.color, state.blinking, state.buzzer) {
        (LightColor::Off, false, false) => "00",
        (LightColor::Off, _, _) => {
            return Err(CoreError::EncodingUnsupported {
                color: state.color,
                blinking: state.blinking,
                buzzer: state.buzzer,
            })
        }
        (LightColor::Red, false, _) => "10",
        (LightColor::Red, true, _) => "11",
        (LightColor::Green, false, _) => "20",
        (LightColor::Green, true, _) => "21",
    };

    let buzzer = if state.buzzer { '1' } else { '0' };
    Ok(format!("{}{}", code, buzzer))
}

// =============================================================================
// Display Field
// =============================================================================

/// Fits text into the display field.
///
/// Longer text is truncated to the field width, shorter text is
/// left-padded with spaces. The result is always exactly
/// [`DISPLAY_WIDTH`] characters.
pub fn normalize_display(text: &str) -> String {
    if text.chars().count() >= DISPLAY_WIDTH {
        text.chars().take(DISPLAY_WIDTH).collect()
    } else {
        format!("{:>width$}", text, width = DISPLAY_WIDTH)
    }
}

/// Renders a basket's fill level, e.g. `"  2/3"`.
///
/// Falls back to the bare quantity when the ratio does not fit.
pub fn quantity_display(quantity: u32, max_quantity: u32) -> String {
    let ratio = format!("{}/{}", quantity, max_quantity);
    if ratio.chars().count() > DISPLAY_WIDTH {
        normalize_display(&quantity.to_string())
    } else {
        normalize_display(&ratio)
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Encodes a pick sequence for one or more modules.
///
/// All addresses receive the same intent and the same display text.
pub fn encode_pick(
    intent: &LightIntent,
    addresses: &[ModuleAddress],
    display: &str,
) -> CoreResult<String> {
    if addresses.is_empty() {
        return Err(CoreError::NoModules);
    }

    let mut command = String::with_capacity(
        32 + addresses.len() * (ADDRESS_WIDTH + DISPLAY_WIDTH),
    );
    command.push_str(COMMAND_PREFIX);
    command.push_str(FUNCTION_CODE);
    command.push_str(SUBFUNCTION_CODE);

    command.push_str(INITIAL_MODE_MARKER);
    command.push_str(&mode_code(&intent.initial)?);
    command.push(INITIAL_MODE_TERMINATOR);

    if let Some(after) = &intent.after_confirm {
        command.push_str(CONFIRM_MODE_MARKER);
        command.push_str(&mode_code(after)?);
        command.push(CONFIRM_MODE_TERMINATOR);
    }

    let field = normalize_display(display);
    for address in addresses {
        command.push_str(&address.to_string());
        command.push_str(&field);
    }

    Ok(command)
}

/// Encodes the turn-off command for one or more modules.
pub fn encode_off(addresses: &[ModuleAddress]) -> CoreResult<String> {
    if addresses.is_empty() {
        return Err(CoreError::NoModules);
    }

    let blank = " ".repeat(DISPLAY_WIDTH);
    let mut command =
        String::with_capacity(1 + addresses.len() * (ADDRESS_WIDTH + DISPLAY_WIDTH));
    command.push_str(OFF_COMMAND_PREFIX);
    for address in addresses {
        command.push_str(&address.to_string());
        command.push_str(&blank);
    }

    Ok(command)
}

/// Dark and silent, but the module button stays live.
pub fn encode_armed(addresses: &[ModuleAddress]) -> CoreResult<String> {
    encode_pick(&LightIntent::armed(), addresses, "")
}

/// Red blinking with buzzer and `ERR` on the display.
pub fn encode_error_flash(address: ModuleAddress) -> CoreResult<String> {
    encode_pick(&LightIntent::error_flash(), &[address], ERROR_DISPLAY)
}

/// Green blinking, turning steady green once confirmed.
pub fn encode_target(address: ModuleAddress, display: &str) -> CoreResult<String> {
    encode_pick(&LightIntent::target(), &[address], display)
}

// =============================================================================
// Unit Tests
// =============================================================================
