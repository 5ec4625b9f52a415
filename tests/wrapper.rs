use arraybridge::array::{Array, DType, Device, NativeArray};
use arraybridge::container::Container;
use arraybridge::error::{Result, WrapError};
use arraybridge::function::{ArraySpec, Function, Reduce};
use arraybridge::value::{CallArgs, Value};
use arraybridge::wrapper::{unwrap_function, wrap_function};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn backend_fn(
    name: &str,
    params: &[&str],
    body: impl Fn(CallArgs) -> Result<Value> + Send + Sync + 'static,
) -> Function {
    Function::builder(name)
        .module("arraybridge.functional.backends.numpy")
        .params(params.iter().copied())
        .build(body)
        .unwrap()
}

fn doubled(call: CallArgs) -> Result<Value> {
    let x = call.require(0, "x")?.expect_native()?;
    Ok(Value::Native(NativeArray::from_vec(
        x.to_vec().iter().map(|v| v * 2.0).collect(),
    )))
}

fn random_vec(n: usize) -> Vec<f64> {
    let mut rng = rand::rng();
    (0..n).map(|_| rng.random_range(-10.0..10.0)).collect()
}

#[test]
fn test_wrapping_is_idempotent() {
    let f = backend_fn("scale", &["x"], doubled);
    let once = wrap_function(&f);
    let twice = wrap_function(&once);
    assert!(once.is_wrapped());
    assert!(twice.ptr_eq(&once));
}

#[test]
fn test_unwrap_recovers_original() {
    let f = backend_fn("scale", &["x"], doubled);
    let wrapped = wrap_function(&f);
    assert!(unwrap_function(&wrapped).ptr_eq(&f));
    assert!(unwrap_function(&f).ptr_eq(&f));
}

#[test]
fn test_excluded_and_private_functions_stay_unwrapped() {
    let utility = backend_fn("to_native", &["x"], doubled);
    assert!(wrap_function(&utility).ptr_eq(&utility));

    let private = backend_fn("_scale", &["x"], doubled);
    assert!(wrap_function(&private).ptr_eq(&private));
}

#[test]
fn test_arguments_and_results_are_converted() {
    let wrapped = wrap_function(&backend_fn("scale", &["x"], doubled));
    let x = Array::from_vec(vec![1.0, -3.0]);
    let ret = wrapped.call(CallArgs::new().with_arg(x)).unwrap();
    let Value::Array(ret) = ret else {
        panic!("expected a unified array, got {ret:?}");
    };
    assert_eq!(ret.to_vec(), vec![2.0, -6.0]);
}

#[test]
fn test_out_is_emulated_when_backend_lacks_it() {
    let data = random_vec(16);
    let expected: Vec<f64> = data.iter().map(|v| v * 2.0).collect();
    let wrapped = wrap_function(&backend_fn("scale", &["x"], doubled));

    let out = Array::from_vec(vec![0.0; 16]);
    let ret = wrapped
        .call(
            CallArgs::new()
                .with_arg(Array::from_vec(data.clone()))
                .with_kwarg("out", out.clone()),
        )
        .unwrap();
    assert!(ret.as_array().unwrap().ptr_eq(&out));
    assert_eq!(out.to_vec(), expected);

    let native_out = NativeArray::from_vec(vec![0.0; 16]);
    let ret = wrapped
        .call(
            CallArgs::new()
                .with_arg(Array::from_vec(data))
                .with_kwarg("out", native_out.clone()),
        )
        .unwrap();
    assert!(ret.as_native().unwrap().ptr_eq(&native_out));
    assert_eq!(native_out.to_vec(), expected);
}

#[test]
fn test_out_is_forwarded_when_backend_declares_it() {
    let out = Array::from_vec(vec![0.0; 2]);
    let expected_native = out.data();
    let saw_native_out = Arc::new(AtomicBool::new(false));

    let seen = Arc::clone(&saw_native_out);
    let f = backend_fn("scale_into", &["x", "out"], move |call| {
        let dst = call.get_kwarg("out").and_then(Value::as_native).cloned();
        seen.store(
            dst.as_ref().is_some_and(|d| d.ptr_eq(&expected_native)),
            Ordering::SeqCst,
        );
        let ret = doubled(call)?;
        match dst {
            Some(dst) => Ok(Value::Native(arraybridge::array::inplace_update(
                &dst,
                ret.expect_native()?,
            ))),
            None => Ok(ret),
        }
    });

    let ret = wrap_function(&f)
        .call(
            CallArgs::new()
                .with_arg(Array::from_vec(vec![1.5, 2.5]))
                .with_kwarg("out", out.clone()),
        )
        .unwrap();
    assert!(saw_native_out.load(Ordering::SeqCst));
    assert!(ret.as_array().unwrap().ptr_eq(&out));
    assert_eq!(out.to_vec(), vec![3.0, 5.0]);
}

#[test]
fn test_explicit_none_out_is_ignored() {
    let wrapped = wrap_function(&backend_fn("scale", &["x"], doubled));
    let ret = wrapped
        .call(
            CallArgs::new()
                .with_arg(Array::from_vec(vec![1.0]))
                .with_kwarg("out", Value::None),
        )
        .unwrap();
    assert_eq!(ret.as_array().unwrap().to_vec(), vec![2.0]);
}

fn echo_kwarg(key: &'static str) -> impl Fn(CallArgs) -> Result<Value> + Send + Sync + 'static {
    move |call: CallArgs| Ok(call.get_kwarg(key).cloned().unwrap_or_default())
}

#[test]
fn test_dtype_is_inferred_from_first_array() {
    let wrapped = wrap_function(&backend_fn("ones_like", &["x", "dtype"], echo_kwarg("dtype")));
    let x = Array::new(NativeArray::new(vec![2], vec![1.0, 2.0], DType::Int32, Device::Cpu).unwrap());
    let ret = wrapped.call(CallArgs::new().with_arg(x)).unwrap();
    assert_eq!(ret, Value::Dtype(DType::Int32));
}

#[test]
fn test_dtype_falls_back_to_configured_default() {
    let wrapped = wrap_function(&backend_fn("eye", &["n", "dtype"], echo_kwarg("dtype")));
    let ret = wrapped.call(CallArgs::new().with_arg(Value::Int(3))).unwrap();
    assert_eq!(ret, Value::Dtype(DType::Float32));

    let ret = wrapped
        .call(CallArgs::new().with_arg(Value::Int(3)).with_kwarg("dtype", "float64"))
        .unwrap();
    assert_eq!(ret, Value::Dtype(DType::Float64));
}

#[test]
fn test_excluded_functions_receive_raw_dtype() {
    let wrapped = wrap_function(&backend_fn("arange", &["stop", "dtype"], echo_kwarg("dtype")));
    let ret = wrapped.call(CallArgs::new().with_arg(Value::Int(5))).unwrap();
    assert_eq!(ret, Value::None);

    let ret = wrapped
        .call(CallArgs::new().with_arg(Value::Int(5)).with_kwarg("dtype", DType::Int32))
        .unwrap();
    assert_eq!(ret, Value::Dtype(DType::Int32));
}

#[test]
fn test_device_follows_first_array() {
    let wrapped = wrap_function(&backend_fn("empty_like", &["x", "device"], echo_kwarg("device")));
    let on_gpu = Array::new(NativeArray::new(vec![1], vec![0.0], DType::Float32, Device::Gpu(1)).unwrap());
    let ret = wrapped.call(CallArgs::new().with_arg(on_gpu)).unwrap();
    assert_eq!(ret, Value::Device(Device::Gpu(1)));

    let ret = wrapped.call(CallArgs::new().with_arg(Value::Int(0))).unwrap();
    assert_eq!(ret, Value::Device(Device::Cpu));
}

#[test]
fn test_undeclared_dtype_is_not_forwarded() {
    let f = backend_fn("negate", &["x"], |call| {
        Ok(Value::Bool(call.get_kwarg("dtype").is_none() && call.get_kwarg("device").is_none()))
    });
    let ret = wrap_function(&f)
        .call(
            CallArgs::new()
                .with_arg(Array::scalar(1.0))
                .with_kwarg("dtype", DType::Float64)
                .with_kwarg("device", Device::Cpu),
        )
        .unwrap();
    assert_eq!(ret, Value::Bool(true));
}

#[test]
fn test_container_arguments_redirect_to_static_method() {
    Container::register_method(
        "rescale_cont",
        Arc::new(|call: CallArgs| Ok(Value::Int(i64::try_from(call.args.len()).unwrap_or_default()))),
    );
    let f = backend_fn("rescale_cont", &["x", "factor"], |_| {
        Err(WrapError::backend("rescale_cont", "backend must not see containers"))
    });
    let wrapped = wrap_function(&f);

    let nested = Value::List(vec![Value::Container(
        Container::new().with("w", Array::scalar(1.0)),
    )]);
    let ret = wrapped
        .call(CallArgs::new().with_arg(nested).with_arg(2.0))
        .unwrap();
    assert_eq!(ret, Value::Int(2));

    let err = wrapped
        .call(CallArgs::new().with_arg(Array::scalar(1.0)).with_arg(2.0))
        .unwrap_err();
    assert_eq!(err, WrapError::backend("rescale_cont", "backend must not see containers"));
}

#[test]
fn test_container_supporting_functions_are_not_redirected() {
    Container::register_method("stable_divide", Arc::new(|_: CallArgs| Ok(Value::Str("static".into()))));
    let f = backend_fn("stable_divide", &["x"], |_| Ok(Value::Str("backend".into())));
    let cont = Container::new().with("a", Array::scalar(1.0));
    let ret = wrap_function(&f).call(CallArgs::new().with_arg(cont)).unwrap();
    assert_eq!(ret, Value::Str("backend".into()));
}

#[test]
fn test_raw_return_functions_skip_result_conversion() {
    let listed = backend_fn("to_list", &["x"], |call| Ok(call.require(0, "x")?.clone()));
    let ret = wrap_function(&listed)
        .call(CallArgs::new().with_arg(Array::scalar(4.0)))
        .unwrap();
    assert!(ret.as_native().is_some());

    let pieces = |call: CallArgs| -> Result<Value> {
        let x = call.require(0, "x")?.clone();
        Ok(Value::List(vec![x.clone(), x]))
    };
    let ret = wrap_function(&backend_fn("unstack", &["x"], pieces))
        .call(CallArgs::new().with_arg(Array::scalar(4.0)))
        .unwrap();
    let Value::List(items) = ret else { panic!("expected a list") };
    assert!(items.iter().all(|v| v.as_native().is_some()));

    let ret = wrap_function(&backend_fn("duplicate", &["x"], pieces))
        .call(CallArgs::new().with_arg(Array::scalar(4.0)))
        .unwrap();
    let Value::List(items) = ret else { panic!("expected a list") };
    assert!(items.iter().all(|v| v.as_array().is_some()));
}

#[test]
fn test_metadata_is_carried_onto_adapter() {
    let f = Function::builder("reduce_sum")
        .module("arraybridge.functional.backends.numpy")
        .params(["x", "dtype", "out"])
        .array_spec(ArraySpec {
            array_params: vec!["x".into()],
        })
        .reduce(Reduce::Sum)
        .build(|call| Ok(call.require(0, "x")?.clone()))
        .unwrap();
    let wrapped = wrap_function(&f);

    assert_eq!(wrapped.name(), Some("reduce_sum"));
    assert_eq!(wrapped.signature(), f.signature());
    assert_eq!(wrapped.array_spec(), f.array_spec());
    assert_eq!(wrapped.reduce(), Some(Reduce::Sum));
    let flags = wrapped.adapter_flags().unwrap();
    assert!(flags.handle_out_with_backend && flags.handle_dtype && !flags.handle_dev);
    assert!(f.adapter_flags().is_none());
}

#[test]
fn test_backend_errors_propagate_unchanged() {
    let f = backend_fn("explode", &["x", "dtype", "device"], |_| {
        Err(WrapError::backend("explode", "kaboom"))
    });
    let err = wrap_function(&f)
        .call(CallArgs::new().with_arg(Array::scalar(0.0)))
        .unwrap_err();
    assert_eq!(err, WrapError::backend("explode", "kaboom"));
}
