#![cfg(test)]

use super::*;

#[test]
fn registry_widths_match_scalar_sizes() {
    assert_eq!(Dtype::Float.size_bytes(), 4);
    assert_eq!(Dtype::Double.size_bytes(), 8);
    assert_eq!(Dtype::Bool.size_bytes(), 1);
    assert_eq!(Dtype::Int.size_bytes(), 4);
    assert_eq!(Dtype::UnsignedInt.size_bytes(), 4);

    fn width_of<T: TensorElement>() -> (Dtype, usize) {
        (T::DTYPE, std::mem::size_of::<T>())
    }
    for (dtype, width) in [width_of::<Bool>(), width_of::<i32>(), width_of::<u32>(), width_of::<f32>(), width_of::<f64>()] {
        assert_eq!(dtype.size_bytes() as usize, width, "{dtype} width");
    }
}

#[test]
fn dtype_parses_names_and_aliases() {
    for dtype in Dtype::ALL {
        assert_eq!(dtype.to_string().parse::<Dtype>(), Ok(dtype));
    }
    assert_eq!("f32".parse::<Dtype>(), Ok(Dtype::Float));
    assert_eq!("unsignedint".parse::<Dtype>(), Ok(Dtype::UnsignedInt));
    assert_eq!("i32".parse::<Dtype>(), Ok(Dtype::Int));
    assert!("half".parse::<Dtype>().is_err());
}

#[test]
fn dtype_serializes_by_name() {
    let json = serde_json::to_string(&Dtype::UnsignedInt).unwrap();
    assert_eq!(json, "\"UnsignedInt\"");
    let back: Dtype = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Dtype::UnsignedInt);
}

#[test]
fn bool_reads_any_nonzero_byte_as_true() {
    assert!(Bool(7).get());
    assert!(!bool::from(Bool::FALSE));
    assert_eq!(Bool::from(true), Bool::TRUE);
}
