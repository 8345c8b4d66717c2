use candle_core::Device;

use crate::core::ModelOptions;

/// Device requested by a pipeline builder.
#[derive(Clone, Default)]
pub enum DeviceRequest {
    /// CUDA device 0 when available, otherwise CPU.
    #[default]
    Default,
    Cpu,
    Cuda(usize),
    Explicit(Device),
}

impl DeviceRequest {
    pub fn resolve(self) -> anyhow::Result<Device> {
        match self {
            DeviceRequest::Default => Ok(Device::cuda_if_available(0)?),
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => Ok(Device::new_cuda(i)?),
            DeviceRequest::Explicit(d) => Ok(d),
        }
    }
}

/// Cache key combining model options and device location, so the same
/// checkpoint loaded on two devices is cached twice.
pub fn build_cache_key<O: ModelOptions>(options: &O, device: &Device) -> String {
    format!("{}-{:?}", options.cache_key(), device.location())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Key(&'static str);

    impl ModelOptions for Key {
        fn cache_key(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn cpu_request_resolves_to_cpu() {
        assert!(DeviceRequest::Cpu.resolve().unwrap().is_cpu());
        assert!(DeviceRequest::Explicit(Device::Cpu).resolve().unwrap().is_cpu());
    }

    #[test]
    fn cache_key_includes_device() {
        let key = build_cache_key(&Key("colbert-ir/colbertv2.0@main"), &Device::Cpu);
        assert!(key.starts_with("colbert-ir/colbertv2.0@main-"));
        assert!(key.contains("Cpu"));
    }
}
