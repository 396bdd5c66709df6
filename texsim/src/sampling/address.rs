use super::sampler::AddressMode;

/// Maps an integer texel coordinate into `[0, size)`.
pub fn apply_address_mode(mode: AddressMode, coord: i64, size: u32) -> u32 {
    assert!(size > 0);
    let size = size as i64;
    let v = match mode {
        AddressMode::ClampToEdge => coord.clamp(0, size - 1),
        AddressMode::Repeat => coord.rem_euclid(size),
        AddressMode::MirrorRepeat => {
            let n = coord.rem_euclid(2 * size);
            if n < size { n } else { 2 * size - 1 - n }
        }
    };
    v as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AddressMode::ClampToEdge)]
    #[case(AddressMode::Repeat)]
    #[case(AddressMode::MirrorRepeat)]
    fn identity_inside(#[case] mode: AddressMode) {
        for size in 1..9u32 {
            for x in 0..size {
                assert_eq!(apply_address_mode(mode, x as i64, size), x);
            }
        }
    }

    #[test]
    fn clamp_to_edge() {
        assert_eq!(apply_address_mode(AddressMode::ClampToEdge, -5, 4), 0);
        assert_eq!(apply_address_mode(AddressMode::ClampToEdge, 4, 4), 3);
        assert_eq!(apply_address_mode(AddressMode::ClampToEdge, 100, 4), 3);
    }

    #[test]
    fn repeat_is_periodic() {
        for x in -20..20i64 {
            assert_eq!(apply_address_mode(AddressMode::Repeat, x, 5), apply_address_mode(AddressMode::Repeat, x + 5, 5));
        }
        assert_eq!(apply_address_mode(AddressMode::Repeat, -1, 5), 4);
    }

    #[rstest]
    #[case(-1, 0)]
    #[case(-2, 1)]
    #[case(4, 3)]
    #[case(5, 2)]
    #[case(8, 0)]
    #[case(-5, 3)]
    fn mirror_repeat(#[case] coord: i64, #[case] expected: u32) {
        assert_eq!(apply_address_mode(AddressMode::MirrorRepeat, coord, 4), expected);
    }

    #[test]
    fn mirror_repeat_reflects() {
        let size = 6u32;
        for x in 0..size as i64 {
            assert_eq!(
                apply_address_mode(AddressMode::MirrorRepeat, x, size),
                apply_address_mode(AddressMode::MirrorRepeat, -1 - x, size)
            );
        }
    }
}
