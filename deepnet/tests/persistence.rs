//! Save/Load Tests

mod common;

#[cfg(test)]
mod tests {
    use super::common;
    use deepnet::prelude::*;

    fn config() -> NetConfig {
        NetConfig {
            input_size: 9,
            batch_size: 2,
            kernel: KernelVariant::Checked,
            layers: vec![
                DenseConfig::new(12, Activation::Tanh),
                DenseConfig {
                    kernel: Some(KernelVariant::Unchecked),
                    ..DenseConfig::new(4, Activation::Identity)
                },
            ],
        }
    }

    #[test]
    fn test_saved_net_reproduces_outputs() {
        let Some(device) = common::device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.bin");

        let mut net = DeepNet::from_config(&device, &config()).unwrap();
        let input = common::wave(9 * 2, 0.0, 1.0);
        let before = net.forward(&input).unwrap();
        save_net(&net, &path).unwrap();

        assert_eq!(net.layer(1).unwrap().kernel().variant, KernelVariant::Unchecked);

        let mut loaded = load_net(&device, &path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.input_size(), 9);
        assert_eq!(loaded.batch_size(), 2);
        for i in 0..2 {
            let a = net.layer(i).unwrap();
            let b = loaded.layer(i).unwrap();
            assert_eq!(a.activation(), b.activation());
            assert_eq!(a.kernel(), b.kernel());
            for ((name, x), (_, y)) in a.named_parameters().iter().zip(b.named_parameters()) {
                assert_eq!(x.read().unwrap(), y.read().unwrap(), "layer {} {}", i, name);
            }
        }
        assert_eq!(loaded.forward(&input).unwrap(), before);
    }

    #[test]
    fn test_missing_file() {
        let Some(device) = common::device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_net(&device, dir.path().join("absent.bin")),
            Err(NetError::Io(_))
        ));
    }

    #[test]
    fn test_garbage_file() {
        let Some(device) = common::device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"definitely not a network").unwrap();
        assert!(matches!(
            load_net(&device, &path),
            Err(NetError::InvalidFormat(_))
        ));
    }
}
