//! Upcall scenarios: a native function receives a va_list and a stub
//! address, calls back through the stub, and the handler recovers the list
//! from its address and sums every argument.

use ffi_valist::linker::{NativeFn, SymbolTable, UpcallHandler, UpcallStubs};
use ffi_valist::{
    AbiProfile, ArgValue, CallbackRegistry, Endian, FunctionAddress, FunctionDescriptor, Layout,
    LinkError, Linker, ScalarKind, Scope, Target, VaListBuilder,
};
use ffi_valist::valist::{VaList, VaListReader};
use std::sync::Arc;

const TRAMPOLINE: &str = "sumFromVaListByUpcall";

/// One variadic argument
#[derive(Clone)]
enum Varg {
    /// Passed by value
    Value(Layout, ArgValue),
    /// Stored in scope memory, passed as a pointer
    ByPtr(Layout, ArgValue),
}

impl Varg {
    fn layout(&self) -> &Layout {
        match self {
            Self::Value(layout, _) | Self::ByPtr(layout, _) => layout,
        }
    }
}

/// Sum of every scalar leaf in `bytes`
fn leaf_sum(layout: &Layout, bytes: &[u8], endian: Endian) -> f64 {
    layout
        .leaf_scalars()
        .into_iter()
        .map(|(offset, kind)| {
            let leaf = Layout::scalar(kind);
            let value = ArgValue::decode(&leaf, &bytes[offset..offset + kind.size()], endian)
                .expect("leaf decodes");
            value
                .as_f64()
                .or_else(|| value.as_i64().map(|v| v as f64))
                .expect("numeric leaf")
        })
        .sum()
}

fn read_arg(
    reader: &mut VaListReader,
    scope: &Scope,
    varg: &Varg,
    profile: &AbiProfile,
) -> Result<f64, LinkError> {
    let layout = varg.layout();
    let bytes = match varg {
        Varg::Value(..) => reader.next(layout)?,
        Varg::ByPtr(..) => {
            let address = reader.next_address()?;
            scope.read_at(address, layout.size())?
        }
    };
    Ok(leaf_sum(layout, &bytes, profile.endian))
}

/// Build the list, register the summing upcall and call the trampoline
fn run(profile: AbiProfile, vargs: Vec<Varg>) -> f64 {
    let table = Arc::new(SymbolTable::new());
    let stubs = Arc::new(UpcallStubs::new());
    let linker = Linker::in_process(table.clone(), stubs.clone());
    let pointer = profile.pointer();
    let int = Layout::scalar(ScalarKind::I32);
    let double = Layout::scalar(ScalarKind::F64);

    let dispatch = stubs.clone();
    let trampoline: NativeFn = Arc::new(move |args: &[ArgValue], scope: &Scope| {
        let stub = FunctionAddress(args[2].as_address().unwrap_or_default());
        let list = args[1].clone();
        dispatch.invoke(stub, &[args[0].clone(), list], scope)
    });
    table
        .define(
            TRAMPOLINE,
            FunctionDescriptor::of(double.clone(), [int.clone(), pointer.clone(), pointer.clone()]),
            trampoline,
        )
        .unwrap();

    let expected = vargs.clone();
    let handler: UpcallHandler = Arc::new(move |args: &[ArgValue], scope: &Scope| {
        let count = args[0].as_i64().unwrap_or_default() as usize;
        let list = VaList::from_address(scope, args[1].as_address().unwrap_or_default())?;
        let mut reader = list.reader();
        let mut sum = 0.0;
        for varg in expected.iter().take(count) {
            sum += read_arg(&mut reader, scope, varg, &profile)?;
        }
        Ok(Some(ArgValue::F64(sum)))
    });
    let stub = linker
        .probe_callbacks()
        .expect("in-process linker registers callbacks")
        .register_callback(FunctionDescriptor::of(double, [int, pointer.clone()]), handler)
        .unwrap();

    let scope = Scope::open();
    let list = VaListBuilder::make(profile, &scope, |builder| {
        for varg in &vargs {
            match varg {
                Varg::Value(layout, value) => {
                    builder.append(layout, value)?;
                }
                Varg::ByPtr(layout, value) => {
                    let segment = scope.allocate(layout.size(), layout.align())?;
                    segment.write(0, &value.encode(layout, profile.endian)?)?;
                    builder.append_address(&pointer, segment.address())?;
                }
            }
        }
        Ok(())
    })
    .unwrap();

    let result = linker
        .downcall(
            TRAMPOLINE,
            &[
                ArgValue::I32(vargs.len() as i32),
                ArgValue::Address(list.address()),
                ArgValue::Address(stub.get()),
            ],
            &scope,
        )
        .unwrap();
    scope.close().unwrap();

    result.and_then(|v| v.as_f64()).expect("double result")
}

fn ints(values: &[i32]) -> Vec<Varg> {
    values
        .iter()
        .map(|&v| Varg::Value(Layout::scalar(ScalarKind::I32), ArgValue::I32(v)))
        .collect()
}

fn longs(profile: &AbiProfile, values: &[i64]) -> Vec<Varg> {
    values
        .iter()
        .map(|&v| Varg::Value(profile.long_layout(), ArgValue::I64(v)))
        .collect()
}

fn doubles(values: &[f64]) -> Vec<Varg> {
    values
        .iter()
        .map(|&v| Varg::Value(Layout::scalar(ScalarKind::F64), ArgValue::F64(v)))
        .collect()
}

/// Struct with members elem1..elemN of the given kinds, padding where `Some`
fn struct_layout(profile: &AbiProfile, members: &[Option<ScalarKind>], pad: usize) -> Layout {
    let mut builder = profile.struct_builder();
    let mut index = 0;
    for member in members {
        builder = match member {
            Some(kind) => {
                index += 1;
                builder.field(format!("elem{}", index), *kind)
            }
            None => builder.padding(pad),
        };
    }
    builder.build().unwrap()
}

/// One struct argument per row; row values fill elem1, elem2, ...
fn structs(profile: &AbiProfile, layout: &Layout, rows: Vec<Vec<ArgValue>>) -> Vec<Varg> {
    let shape = layout.as_struct().unwrap();
    rows.into_iter()
        .map(|row| {
            let names: Vec<String> = (1..=row.len()).map(|i| format!("elem{}", i)).collect();
            let values: Vec<(&str, ArgValue)> = names
                .iter()
                .map(String::as_str)
                .zip(row)
                .collect();
            let image = shape.encode(&values, profile.endian).unwrap();
            Varg::Value(layout.clone(), ArgValue::Aggregate(image))
        })
        .collect()
}

fn bytes(rows: &[&[i8]]) -> Vec<Vec<ArgValue>> {
    rows.iter().map(|r| r.iter().map(|&v| ArgValue::I8(v)).collect()).collect()
}

fn shorts(rows: &[&[i16]]) -> Vec<Vec<ArgValue>> {
    rows.iter().map(|r| r.iter().map(|&v| ArgValue::I16(v)).collect()).collect()
}

fn int_rows(rows: &[&[i32]]) -> Vec<Vec<ArgValue>> {
    rows.iter().map(|r| r.iter().map(|&v| ArgValue::I32(v)).collect()).collect()
}

fn float_rows(rows: &[&[f32]]) -> Vec<Vec<ArgValue>> {
    rows.iter().map(|r| r.iter().map(|&v| ArgValue::F32(v)).collect()).collect()
}

fn double_rows(rows: &[&[f64]]) -> Vec<Vec<ArgValue>> {
    rows.iter().map(|r| r.iter().map(|&v| ArgValue::F64(v)).collect()).collect()
}

fn assert_close(target: Target, actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{}: expected {} got {}",
        target,
        expected,
        actual
    );
}

fn each_target(check: impl Fn(Target, AbiProfile)) {
    for target in Target::ALL {
        check(target, target.profile());
    }
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_add_ints() {
    each_target(|target, profile| {
        assert_close(target, run(profile, ints(&[700, 800, 900, 1000])), 3400.0, 0.0);
    });
}

#[test]
fn test_add_longs() {
    each_target(|target, profile| {
        let vargs = longs(&profile, &[700000, 800000, 900000, 1000000]);
        assert_close(target, run(profile, vargs), 3400000.0, 0.0);
    });
}

#[test]
fn test_add_doubles() {
    each_target(|target, profile| {
        let vargs = doubles(&[111150.1001, 111160.2002, 111170.1001, 111180.2002]);
        assert_close(target, run(profile, vargs), 444660.6006, 0.0001);
    });
}

#[test]
fn test_add_mixed_args() {
    each_target(|target, profile| {
        let mut vargs = ints(&[700]);
        vargs.extend(longs(&profile, &[800000]));
        vargs.extend(doubles(&[160.2002]));
        assert_close(target, run(profile, vargs), 800860.2002, 0.0001);
    });
}

#[test]
fn test_add_more_mixed_args() {
    each_target(|target, profile| {
        let mut vargs = Vec::new();
        vargs.extend(ints(&[100]));
        vargs.extend(longs(&profile, &[200000]));
        vargs.extend(ints(&[300]));
        vargs.extend(longs(&profile, &[400000]));
        vargs.extend(ints(&[500]));
        vargs.extend(longs(&profile, &[600000]));
        vargs.extend(ints(&[700]));
        vargs.extend(doubles(&[161.2001]));
        vargs.extend(ints(&[800]));
        vargs.extend(doubles(&[162.2002]));
        vargs.extend(ints(&[900]));
        vargs.extend(doubles(&[163.2003]));
        vargs.extend(ints(&[1000]));
        vargs.extend(doubles(&[164.2004]));
        vargs.extend(ints(&[1100]));
        vargs.extend(doubles(&[165.2005]));
        assert_close(target, run(profile, vargs), 1206216.0015, 0.0001);
    });
}

// ============================================================================
// Pointers to scope memory
// ============================================================================

#[test]
fn test_add_ints_by_pointer() {
    each_target(|target, profile| {
        let vargs = [700, 800, 900]
            .iter()
            .map(|&v| Varg::ByPtr(Layout::scalar(ScalarKind::I32), ArgValue::I32(v)))
            .collect();
        assert_close(target, run(profile, vargs), 2400.0, 0.0);
    });
}

#[test]
fn test_add_longs_by_pointer() {
    each_target(|target, profile| {
        let vargs = [700000, 800000, 900000]
            .iter()
            .map(|&v| Varg::ByPtr(profile.long_layout(), ArgValue::I64(v)))
            .collect();
        assert_close(target, run(profile, vargs), 2400000.0, 0.0);
    });
}

#[test]
fn test_add_doubles_by_pointer() {
    each_target(|target, profile| {
        let vargs = [150.1001, 160.2002, 170.1001]
            .iter()
            .map(|&v| Varg::ByPtr(Layout::scalar(ScalarKind::F64), ArgValue::F64(v)))
            .collect();
        assert_close(target, run(profile, vargs), 480.4004, 0.0001);
    });
}

// ============================================================================
// Integral structs
// ============================================================================

#[test]
fn test_add_1_byte_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I8)], 0);
        let rows: Vec<Vec<ArgValue>> = (1..=10).map(|v| vec![ArgValue::I8(v)]).collect();
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 55.0, 0.0);
    });
}

#[test]
fn test_add_2_byte_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I8); 2], 0);
        let vargs = structs(&profile, &layout, bytes(&[&[1, 2], &[3, 4]]));
        assert_close(target, run(profile, vargs), 10.0, 0.0);
    });
}

#[test]
fn test_add_3_byte_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I8); 3], 0);
        let vargs = structs(&profile, &layout, bytes(&[&[1, 2, 3], &[4, 5, 6]]));
        assert_close(target, run(profile, vargs), 21.0, 0.0);
    });
}

#[test]
fn test_add_5_byte_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I8); 5], 0);
        let vargs = structs(&profile, &layout, bytes(&[&[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10]]));
        assert_close(target, run(profile, vargs), 55.0, 0.0);
    });
}

#[test]
fn test_add_7_byte_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I8); 7], 0);
        let rows = bytes(&[&[1, 2, 3, 4, 5, 6, 7], &[8, 9, 10, 11, 12, 13, 14]]);
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 105.0, 0.0);
    });
}

#[test]
fn test_add_1_short_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I16)], 0);
        let rows: Vec<Vec<ArgValue>> = [111, 222, 333, 444, 555, 666, 777, 888, 999, 123]
            .iter()
            .map(|&v| vec![ArgValue::I16(v)])
            .collect();
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 5118.0, 0.0);
    });
}

#[test]
fn test_add_2_short_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I16); 2], 0);
        let vargs = structs(&profile, &layout, shorts(&[&[111, 222], &[333, 444]]));
        assert_close(target, run(profile, vargs), 1110.0, 0.0);
    });
}

#[test]
fn test_add_3_short_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I16); 3], 0);
        let vargs = structs(&profile, &layout, shorts(&[&[111, 222, 333], &[444, 555, 666]]));
        assert_close(target, run(profile, vargs), 2331.0, 0.0);
    });
}

#[test]
fn test_add_1_int_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I32)], 0);
        let rows: Vec<Vec<ArgValue>> = [
            1111111, 2222222, 3333333, 4444444, 5555555, 6666666, 7777777, 8888888, 9999999,
            1234567,
        ]
        .iter()
        .map(|&v| vec![ArgValue::I32(v)])
        .collect();
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 51234562.0, 0.0);
    });
}

#[test]
fn test_add_2_int_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I32); 2], 0);
        let rows = int_rows(&[&[1122333, 4455666], &[2244668, 1133557]]);
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 8956224.0, 0.0);
    });
}

#[test]
fn test_add_3_int_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I32); 3], 0);
        let rows = int_rows(&[&[1122333, 4455666, 7788999], &[1133555, 2244666, 3322111]]);
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 20067330.0, 0.0);
    });
}

#[test]
fn test_add_2_long_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I64); 2], 0);
        let rows = vec![
            vec![ArgValue::I64(1122334455), ArgValue::I64(6677889911)],
            vec![ArgValue::I64(2233445566), ArgValue::I64(7788991122)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 17822661054.0, 0.0);
    });
}

// ============================================================================
// Floating point structs
// ============================================================================

#[test]
fn test_add_1_float_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::F32)], 0);
        let rows: Vec<Vec<ArgValue>> = [1.11f32, 2.22, 3.33, 4.44, 5.56]
            .iter()
            .map(|&v| vec![ArgValue::F32(v)])
            .collect();
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 16.66, 0.01);
    });
}

#[test]
fn test_add_2_float_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::F32); 2], 0);
        let rows = float_rows(&[
            &[1.11, 2.22],
            &[3.33, 4.44],
            &[5.55, 6.66],
            &[7.77, 8.88],
            &[9.99, 1.23],
            &[4.56, 7.89],
        ]);
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 63.63, 0.01);
    });
}

#[test]
fn test_add_3_float_structs() {
    each_target(|target, profile| {
        // ppc64 passes the 12-byte struct as is; elsewhere it carries 4 bytes of tail padding
        let float = Some(ScalarKind::F32);
        let layout = match target {
            Target::LinuxPpc64le | Target::AixPpc64 => {
                struct_layout(&profile, &[float, float, float], 0)
            }
            _ => struct_layout(&profile, &[float, float, float, None], 4),
        };
        let rows = float_rows(&[
            &[1.11, 2.22, 3.33],
            &[4.44, 5.55, 6.66],
            &[7.77, 8.88, 9.99],
            &[1.23, 4.56, 7.89],
            &[9.87, 6.54, 3.21],
            &[2.46, 8.13, 5.79],
        ]);
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 99.63, 0.01);
    });
}

#[test]
fn test_add_1_double_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::F64)], 0);
        let rows: Vec<Vec<ArgValue>> = [11111.1001, 11111.1002, 11111.1003, 11111.1004, 11111.1005]
            .iter()
            .map(|&v| vec![ArgValue::F64(v)])
            .collect();
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 55555.5015, 0.0001);
    });
}

#[test]
fn test_add_2_double_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::F64); 2], 0);
        let rows = double_rows(&[&[11150.1001, 11160.2002], &[11170.1001, 11180.2002]]);
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 44660.6006, 0.0001);
    });
}

// ============================================================================
// Mixed structs
// ============================================================================

#[test]
fn test_add_int_short_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I32), Some(ScalarKind::I16)], 0);
        let rows = vec![
            vec![ArgValue::I32(1111111), ArgValue::I16(123)],
            vec![ArgValue::I32(2222222), ArgValue::I16(456)],
            vec![ArgValue::I32(3333333), ArgValue::I16(789)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 6668034.0, 0.0);
    });
}

#[test]
fn test_add_short_int_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(
            &profile,
            &[Some(ScalarKind::I16), None, Some(ScalarKind::I32)],
            2,
        );
        assert_eq!(layout.size(), 8);
        let rows = vec![
            vec![ArgValue::I16(123), ArgValue::I32(1111111)],
            vec![ArgValue::I16(456), ArgValue::I32(2222222)],
            vec![ArgValue::I16(789), ArgValue::I32(3333333)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 6668034.0, 0.0);
    });
}

#[test]
fn test_add_int_long_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(
            &profile,
            &[Some(ScalarKind::I32), None, Some(ScalarKind::I64)],
            4,
        );
        assert_eq!(layout.size(), 16);
        let rows = vec![
            vec![ArgValue::I32(1111111), ArgValue::I64(101010101010)],
            vec![ArgValue::I32(2222222), ArgValue::I64(202020202020)],
            vec![ArgValue::I32(3333333), ArgValue::I64(303030303030)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 606067272726.0, 0.0);
    });
}

#[test]
fn test_add_long_int_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::I64), Some(ScalarKind::I32)], 0);
        let rows = vec![
            vec![ArgValue::I64(101010101010), ArgValue::I32(1111111)],
            vec![ArgValue::I64(202020202020), ArgValue::I32(2222222)],
            vec![ArgValue::I64(303030303030), ArgValue::I32(3333333)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 606067272726.0, 0.0);
    });
}

#[test]
fn test_add_float_double_structs() {
    each_target(|target, profile| {
        // AIX packs the double right after the float
        let layout = if target == Target::AixPpc64 {
            let layout = struct_layout(&profile, &[Some(ScalarKind::F32), Some(ScalarKind::F64)], 0);
            assert_eq!(layout.size(), 12);
            layout
        } else {
            struct_layout(
                &profile,
                &[Some(ScalarKind::F32), None, Some(ScalarKind::F64)],
                4,
            )
        };
        let rows = vec![
            vec![ArgValue::F32(1.11), ArgValue::F64(222.222)],
            vec![ArgValue::F32(2.22), ArgValue::F64(333.333)],
            vec![ArgValue::F32(3.33), ArgValue::F64(444.444)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 1006.659, 0.001);
    });
}

#[test]
fn test_add_double_float_structs() {
    each_target(|target, profile| {
        let layout = struct_layout(&profile, &[Some(ScalarKind::F64), Some(ScalarKind::F32)], 0);
        assert_eq!(layout.size(), 16);
        let rows = vec![
            vec![ArgValue::F64(222.222), ArgValue::F32(1.11)],
            vec![ArgValue::F64(333.333), ArgValue::F32(2.22)],
            vec![ArgValue::F64(444.444), ArgValue::F32(3.33)],
        ];
        let vargs = structs(&profile, &layout, rows);
        assert_close(target, run(profile, vargs), 1006.659, 0.001);
    });
}

// ============================================================================
// Failure paths across the boundary
// ============================================================================

#[test]
fn test_upcall_with_stale_list_address() {
    let profile = AbiProfile::sysv_x86_64();
    let stubs = UpcallStubs::new();
    let handler: UpcallHandler = Arc::new(|args: &[ArgValue], scope: &Scope| {
        let list = VaList::from_address(scope, args[0].as_address().unwrap_or_default())?;
        Ok(Some(ArgValue::I32(list.len() as i32)))
    });
    let stub = stubs
        .register_callback(
            FunctionDescriptor::of(ScalarKind::I32, [profile.pointer()]),
            handler,
        )
        .unwrap();

    let first = Scope::open();
    let list = VaListBuilder::make(profile, &first, |b| {
        b.append(&Layout::scalar(ScalarKind::I32), &ArgValue::I32(1))?;
        Ok(())
    })
    .unwrap();

    // The list belongs to another scope
    let other = Scope::open();
    let err = stubs
        .invoke(stub, &[ArgValue::Address(list.address())], &other)
        .unwrap_err();
    assert!(matches!(err, LinkError::Marshal(_)));

    assert_eq!(
        stubs
            .invoke(stub, &[ArgValue::Address(list.address())], &first)
            .unwrap(),
        Some(ArgValue::I32(1))
    );
}

#[test]
fn test_handler_reads_past_end() {
    let profile = AbiProfile::linux_aarch64();
    let vargs = ints(&[1, 2]);
    let scope = Scope::open();
    let list = VaListBuilder::make(profile, &scope, |b| {
        for varg in &vargs {
            if let Varg::Value(layout, value) = varg {
                b.append(layout, value)?;
            }
        }
        Ok(())
    })
    .unwrap();

    let mut reader = list.reader();
    assert_eq!(reader.next_i32().unwrap(), 1);
    assert_eq!(reader.next_i32().unwrap(), 2);
    assert!(matches!(
        reader.next_i32(),
        Err(ffi_valist::MarshalError::ArgumentListExhausted { consumed: 2 })
    ));
}
