pub(crate) trait GribInt<I> {
    fn as_grib_int(&self) -> I;
}

macro_rules! add_impl_for_ints {
    ($(($ty_src:ty, $ty_dst:ty),)*) => ($(
        impl GribInt<$ty_dst> for $ty_src {
            fn as_grib_int(&self) -> $ty_dst {
                if self.leading_zeros() == 0 {
                    let abs = (self << 1 >> 1) as $ty_dst;
                    -abs
                } else {
                    *self as $ty_dst
                }
            }
        }
    )*);
}

add_impl_for_ints! {
    (u8, i8),
    (u16, i16),
    (u32, i32),
    (u64, i64),
}

macro_rules! read_as {
    ($ty:ty, $buf:ident, $start:expr) => {{
        let end = $start + std::mem::size_of::<$ty>();
        <$ty>::from_be_bytes($buf[$start..end].try_into().unwrap())
    }};
}
pub(crate) use read_as;

/// Reads a sign-magnitude GRIB integer of 1, 2, 3 or 4 octets.
pub(crate) fn grib_int_from_bytes(bytes: &[u8]) -> i64 {
    let len = bytes.len();
    match len {
        1 => i64::from(read_as!(u8, bytes, 0).as_grib_int()),
        2 => i64::from(read_as!(u16, bytes, 0).as_grib_int()),
        3 => {
            let first = read_as!(u8, bytes, 0);
            let positive = first.leading_zeros() != 0;
            let rest = i64::from(read_as!(u16, bytes, 1));
            let abs = i64::from(first << 1 >> 1) * 0x10000 + rest;
            if positive {
                abs
            } else {
                -abs
            }
        }
        4 => i64::from(read_as!(u32, bytes, 0).as_grib_int()),
        _ => unimplemented!(),
    }
}

/// Reads an unsigned big-endian GRIB integer of 1..=8 octets.
pub(crate) fn grib_uint_from_bytes(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Appends `value` as a sign-magnitude GRIB integer of `num_octets` octets.
///
/// The magnitude must fit in `8 * num_octets - 1` bits.
pub(crate) fn grib_int_to_bytes(value: i64, num_octets: usize, buf: &mut Vec<u8>) {
    let magnitude = value.unsigned_abs();
    debug_assert!(magnitude < 1 << (num_octets * 8 - 1));
    let sign_bit = if value < 0 { 0x80u8 } else { 0x00 };
    let mut octets = magnitude.to_be_bytes()[8 - num_octets..].to_vec();
    octets[0] |= sign_bit;
    buf.extend_from_slice(&octets);
}

/// Appends `value` as an unsigned big-endian GRIB integer of `num_octets` octets.
pub(crate) fn grib_uint_to_bytes(value: u64, num_octets: usize, buf: &mut Vec<u8>) {
    debug_assert!(num_octets == 8 || value < 1 << (num_octets * 8));
    buf.extend_from_slice(&value.to_be_bytes()[8 - num_octets..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_grib_int_wire_form {
        ($(($name:ident, $value:expr, $num_octets:expr, $wire:expr),)*) => ($(
            #[test]
            fn $name() {
                let mut buf = Vec::new();
                grib_int_to_bytes($value, $num_octets, &mut buf);
                assert_eq!(buf, $wire);
                assert_eq!(grib_int_from_bytes(&buf), $value);
            }
        )*);
    }

    test_grib_int_wire_form! {
        (
            grib_int_wire_form_for_1_byte_positive,
            0b01010101, 1,
            vec![0b01010101]
        ),
        (
            grib_int_wire_form_for_1_byte_negative,
            -0b01010101, 1,
            vec![0b11010101]
        ),
        (
            grib_int_wire_form_for_2_bytes_negative,
            -0x55AA, 2,
            vec![0xd5, 0xaa]
        ),
        (
            grib_int_wire_form_for_3_bytes_negative,
            -0x2AAAAA, 3,
            vec![0xaa, 0xaa, 0xaa]
        ),
        (
            // The sign bit stands alone in the leading octet when the
            // magnitude fits the lower octets.
            grib_int_wire_form_for_3_bytes_negative_small_magnitude,
            -0xAAAA, 3,
            vec![0x80, 0xaa, 0xaa]
        ),
        (
            grib_int_wire_form_for_4_bytes_positive,
            0x01020304, 4,
            vec![0x01, 0x02, 0x03, 0x04]
        ),
        (
            grib_int_wire_form_for_4_bytes_negative,
            -0x01020304, 4,
            vec![0x81, 0x02, 0x03, 0x04]
        ),
        (
            grib_int_wire_form_for_zero,
            0, 2,
            vec![0x00, 0x00]
        ),
    }

    macro_rules! test_grib_int_write_read_identity {
        ($(($name:ident, $value:expr, $num_octets:expr),)*) => ($(
            #[test]
            fn $name() {
                let mut buf = Vec::new();
                grib_int_to_bytes($value, $num_octets, &mut buf);
                assert_eq!(buf.len(), $num_octets);
                assert_eq!(grib_int_from_bytes(&buf), $value);
            }
        )*);
    }

    test_grib_int_write_read_identity! {
        (grib_int_write_read_identity_for_1_byte_negative, -0x55, 1),
        (grib_int_write_read_identity_for_2_bytes_negative, -0x5555, 2),
        (grib_int_write_read_identity_for_3_bytes_negative, -0x555555, 3),
        (grib_int_write_read_identity_for_4_bytes_positive, 0x55555555, 4),
        (grib_int_write_read_identity_for_4_bytes_negative, -0x55555555, 4),
    }

    #[test]
    fn unsigned_write_read_identity() {
        let mut buf = Vec::new();
        grib_uint_to_bytes(0x01020304, 4, &mut buf);
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(grib_uint_from_bytes(&buf), 0x01020304);
    }

    #[test]
    fn unsigned_write_read_identity_for_message_lengths() {
        // Total message lengths travel as 8-octet unsigned integers.
        let mut buf = Vec::new();
        grib_uint_to_bytes(0x0102030405060708, 8, &mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(grib_uint_from_bytes(&buf), 0x0102030405060708);
    }
}
