//! Sample conversions applied in the capture callback

/// Average interleaved frames down to a single channel
pub(crate) fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear resampler that keeps its phase across successive chunks
///
/// `pos` is the source position of the next output sample, counted from
/// `last` (the final sample of the previous chunk) when there is one.
#[derive(Debug, Clone)]
pub(crate) struct LinearResampler {
    ratio: f64,
    pos: f64,
    last: Option<f32>,
}

impl LinearResampler {
    pub(crate) fn new(source_rate: u32, target_rate: u32) -> Self {
        Self {
            ratio: source_rate as f64 / target_rate.max(1) as f64,
            pos: 0.0,
            last: None,
        }
    }

    pub(crate) fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.ratio == 1.0 || input.is_empty() {
            return input.to_vec();
        }

        let offset = usize::from(self.last.is_some());
        let total = input.len() + offset;
        let last = self.last;
        let at = |i: usize| match (last, i.checked_sub(offset)) {
            (_, Some(j)) => input[j],
            (Some(prev), None) => prev,
            (None, None) => input[0],
        };

        let mut output = Vec::with_capacity((input.len() as f64 / self.ratio) as usize + 1);
        while (self.pos.floor() as usize) + 1 < total {
            let idx = self.pos.floor() as usize;
            let frac = (self.pos - idx as f64) as f32;
            output.push(at(idx) * (1.0 - frac) + at(idx + 1) * frac);
            self.pos += self.ratio;
        }

        // Rebase so the last input sample becomes index 0 of the next chunk
        self.pos -= (total - 1) as f64;
        self.last = input.last().copied();

        output
    }
}
