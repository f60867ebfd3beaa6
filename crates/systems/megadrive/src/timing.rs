//! Per-scanline CPU budget
//!
//! The 68000 runs at MCLK/7. Without per-instruction cycle counts the frame
//! loop gives each scanline a fixed budget derived from the master clock:
//!
//! ```text
//! MCLK / frame_rate / lines / cpu_divider / sub_cycles / cycle_scale
//! ```
//!
//! evaluated left to right with integer division. The frame loop runs
//! `sub_cycles` CPU cycles per budget unit. `cycle_scale` is a stand-in until
//! instruction timing exists, so every term can be overridden.

use serde::{Deserialize, Serialize};

pub const MASTER_CLOCK_NTSC: u32 = 53_693_175;
pub const MASTER_CLOCK_PAL: u32 = 53_203_424;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub master_clock_ntsc: u32,
    pub master_clock_pal: u32,
    pub frame_rate_ntsc: u32,
    pub frame_rate_pal: u32,
    /// Lines the frame budget is spread over
    pub lines: u32,
    /// Master clocks per 68000 clock
    pub cpu_divider: u32,
    /// CPU cycles stepped per budget unit
    pub sub_cycles: u32,
    /// Extra divisor standing in for instruction cycle costs
    pub cycle_scale: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            master_clock_ntsc: MASTER_CLOCK_NTSC,
            master_clock_pal: MASTER_CLOCK_PAL,
            frame_rate_ntsc: 60,
            frame_rate_pal: 50,
            lines: 224,
            cpu_divider: 7,
            sub_cycles: 2,
            cycle_scale: 10,
        }
    }
}

impl Timing {
    /// Name of the first zero divisor, if any
    pub fn zero_divisor(&self) -> Option<&'static str> {
        [
            ("frame_rate_ntsc", self.frame_rate_ntsc),
            ("frame_rate_pal", self.frame_rate_pal),
            ("lines", self.lines),
            ("cpu_divider", self.cpu_divider),
            ("sub_cycles", self.sub_cycles),
            ("cycle_scale", self.cycle_scale),
        ]
        .into_iter()
        .find(|&(_, value)| value == 0)
        .map(|(name, _)| name)
    }

    /// Budget units per scanline; the frame loop steps the CPU `sub_cycles` times per unit.
    pub fn cycles_per_scanline(&self, pal: bool) -> u32 {
        let (clock, rate) = if pal {
            (self.master_clock_pal, self.frame_rate_pal)
        } else {
            (self.master_clock_ntsc, self.frame_rate_ntsc)
        };

        [rate, self.lines, self.cpu_divider, self.sub_cycles, self.cycle_scale]
            .into_iter()
            .fold(clock, |acc, divisor| acc / divisor.max(1))
    }

    /// CPU cycles stepped per scanline
    pub fn cpu_cycles_per_scanline(&self, pal: bool) -> u32 {
        self.cycles_per_scanline(pal) * self.sub_cycles
    }
}
